use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use codeclash_core::game::{EndCause, GameSession};
use codeclash_core::leaderboard;
use codeclash_core::player::Player;
use codeclash_core::time::epoch_millis;

/// Per-player summary line in a finished-game report.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerReport {
    pub user_id: Uuid,
    pub nickname: String,
    pub best_num_correct: u32,
    pub problems_solved: usize,
    pub num_submissions: usize,
}

impl PlayerReport {
    fn from_player(player: &Player) -> Self {
        Self {
            user_id: player.user.user_id,
            nickname: player.user.nickname.clone(),
            best_num_correct: player.best_submission().map_or(0, |s| s.num_correct),
            problems_solved: player.solved.iter().filter(|s| **s).count(),
            num_submissions: player.submissions.len(),
        }
    }
}

/// Immutable summary of one finished session, emitted exactly once when
/// the session reaches a terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct GameReport {
    pub room_id: String,
    pub cause: EndCause,
    pub created_at: u64,
    pub duration_secs: u64,
    /// Player lines in final leaderboard order.
    pub players: Vec<PlayerReport>,
}

impl GameReport {
    pub fn from_session(session: &GameSession, cause: EndCause) -> Self {
        let players: Vec<&Player> = session.players.values().collect();
        let ranked = leaderboard::rank(&players);
        Self {
            room_id: session.room.room_id.clone(),
            cause,
            created_at: epoch_millis(),
            duration_secs: session.timer.duration_secs,
            players: ranked.iter().map(|p| PlayerReport::from_player(p)).collect(),
        }
    }
}

/// Destination for finished-game reports.
pub type ReportSink = mpsc::UnboundedSender<GameReport>;

/// Spawn a drain task that logs every report as structured JSON.
/// The task exits when all sinks are dropped.
pub fn spawn_report_logger() -> (ReportSink, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<GameReport>();
    let handle = tokio::spawn(async move {
        while let Some(report) = rx.recv().await {
            match serde_json::to_string(&report) {
                Ok(json) => tracing::info!(
                    room = %report.room_id,
                    cause = ?report.cause,
                    report = %json,
                    "Game finished"
                ),
                Err(e) => tracing::error!(
                    room = %report.room_id, error = %e,
                    "Failed to serialize game report"
                ),
            }
        }
    });
    (tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeclash_core::test_helpers::{make_problem, make_room, make_submission};

    #[test]
    fn report_ranks_players_by_score() {
        let room = make_room(2);
        let second_id = room.users()[1].user_id;
        let mut session = GameSession::from_room(&room, vec![make_problem(3)]).unwrap();
        session
            .apply_submission(&second_id, make_submission(0, 3, 3, 100))
            .unwrap();
        session.finalize(EndCause::TimeExpired);

        let report = GameReport::from_session(&session, EndCause::TimeExpired);
        assert_eq!(report.players.len(), 2);
        assert_eq!(report.players[0].nickname, "Player2");
        assert_eq!(report.players[0].best_num_correct, 3);
        assert_eq!(report.players[0].problems_solved, 1);
        assert_eq!(report.players[1].num_submissions, 0);
    }

    #[tokio::test]
    async fn logger_drains_until_sinks_drop() {
        let (tx, handle) = spawn_report_logger();
        let room = make_room(1);
        let session = GameSession::from_room(&room, vec![make_problem(1)]).unwrap();
        tx.send(GameReport::from_session(&session, EndCause::HostEnded))
            .unwrap();
        drop(tx);
        handle.await.unwrap();
    }
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::{EndCause, GameSession};
use crate::leaderboard;
use crate::notification::GameNotification;
use crate::player::{Player, PlayerColor};
use crate::room::{Room, RoomSettings};
use crate::submission::{Submission, SubmissionResult};
use crate::user::User;

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    RoomSnapshot = 0x01,
    GameSnapshot = 0x02,
    Notification = 0x03,
    GameEnd = 0x04,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::RoomSnapshot),
            0x02 => Some(Self::GameSnapshot),
            0x03 => Some(Self::Notification),
            0x04 => Some(Self::GameEnd),
            _ => None,
        }
    }
}

/// Messages pushed to room subscribers. Snapshots always carry full
/// state, never diffs, so a late subscriber catches up from any frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    RoomSnapshot(RoomDto),
    GameSnapshot(Box<GameDto>),
    Notification(NotificationMsg),
    GameEnd(GameEndMsg),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMsg {
    pub notification: GameNotification,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEndMsg {
    pub cause: EndCause,
    /// Final standings in leaderboard order.
    pub leaderboard: Vec<PlayerDto>,
}

/// Externally-facing view of a user. Session tokens never leave the
/// server; connectivity is exposed as a bare flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDto {
    pub user_id: Uuid,
    pub nickname: String,
    pub active: bool,
    pub spectator: bool,
}

impl UserDto {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            nickname: user.nickname.clone(),
            active: user.is_active(),
            spectator: user.spectator,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomDto {
    pub room_id: String,
    pub host: Option<UserDto>,
    pub users: Vec<UserDto>,
    pub settings: RoomSettings,
    pub active: bool,
}

impl RoomDto {
    pub fn from_room(room: &Room) -> Self {
        Self {
            room_id: room.room_id.clone(),
            host: room.host().map(UserDto::from_user),
            users: room.users().iter().map(UserDto::from_user).collect(),
            settings: room.settings,
            active: room.active,
        }
    }
}

/// Full session snapshot. Players are listed in leaderboard order,
/// recomputed from submission histories on every conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameDto {
    pub room_id: String,
    pub players: Vec<PlayerDto>,
    pub num_problems: usize,
    pub start_time: u64,
    pub end_time: u64,
    pub time_up: bool,
    pub all_solved: bool,
    pub game_ended: bool,
    pub play_again: bool,
    pub end_cause: Option<EndCause>,
}

impl GameDto {
    pub fn from_session(session: &GameSession) -> Self {
        let players: Vec<&Player> = session.players.values().collect();
        let ranked = leaderboard::rank(&players);
        Self {
            room_id: session.room.room_id.clone(),
            players: ranked.iter().map(|p| PlayerDto::from_player(p)).collect(),
            num_problems: session.problems().len(),
            start_time: session.timer.start_time,
            end_time: session.timer.end_time(),
            time_up: session.timer.is_time_up(),
            all_solved: session.all_solved,
            game_ended: session.game_ended,
            play_again: session.play_again,
            end_cause: session.end_cause,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerDto {
    pub user: UserDto,
    pub color: PlayerColor,
    pub solved: Vec<bool>,
    /// Viewer-safe history: hidden-case data redacted.
    pub submissions: Vec<SubmissionDto>,
    pub best_num_correct: Option<u32>,
}

impl PlayerDto {
    pub fn from_player(player: &Player) -> Self {
        Self {
            user: UserDto::from_user(&player.user),
            color: player.color,
            solved: player.solved.clone(),
            submissions: player
                .submissions
                .iter()
                .map(SubmissionDto::viewer_view)
                .collect(),
            best_num_correct: player.best_submission().map(|s| s.num_correct),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionDto {
    pub problem_index: usize,
    pub start_time: u64,
    pub num_correct: u32,
    pub num_test_cases: u32,
    pub runtime_millis: Option<f64>,
    pub compilation_error: Option<String>,
    pub results: Vec<SubmissionResultDto>,
}

impl SubmissionDto {
    /// Requester-facing view: results ordered last-to-first as received,
    /// nothing redacted for the owner.
    pub fn owner_view(submission: &Submission) -> Self {
        Self {
            results: submission
                .results
                .iter()
                .rev()
                .map(SubmissionResultDto::full)
                .collect(),
            ..Self::common(submission)
        }
    }

    /// Shared view for non-owning viewers: hidden cases keep their
    /// verdict but lose input/output detail.
    pub fn viewer_view(submission: &Submission) -> Self {
        Self {
            results: submission
                .results
                .iter()
                .map(SubmissionResultDto::redacted)
                .collect(),
            ..Self::common(submission)
        }
    }

    fn common(submission: &Submission) -> Self {
        Self {
            problem_index: submission.problem_index,
            start_time: submission.start_time,
            num_correct: submission.num_correct,
            num_test_cases: submission.num_test_cases,
            runtime_millis: submission.runtime_millis,
            compilation_error: submission.compilation_error.clone(),
            results: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResultDto {
    pub console: String,
    pub user_output: String,
    pub error: String,
    pub correct_output: String,
    pub correct: bool,
    pub hidden: bool,
}

impl SubmissionResultDto {
    fn full(result: &SubmissionResult) -> Self {
        Self {
            console: result.console.clone(),
            user_output: result.user_output.clone(),
            error: result.error.clone(),
            correct_output: result.correct_output.clone(),
            correct: result.correct,
            hidden: result.hidden,
        }
    }

    fn redacted(result: &SubmissionResult) -> Self {
        if !result.hidden {
            return Self::full(result);
        }
        Self {
            console: String::new(),
            user_output: String::new(),
            error: result.error.clone(),
            correct_output: String::new(),
            correct: result.correct,
            hidden: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlayerCode;
    use crate::problem::{Difficulty, Language, Problem, TestCase};
    use crate::room::{RoomSettings, generate_room_code};

    fn make_problem() -> Problem {
        Problem {
            problem_id: Uuid::new_v4(),
            name: "Sum".to_string(),
            description: "Add".to_string(),
            difficulty: Difficulty::Easy,
            test_cases: vec![
                TestCase {
                    input: "1 2".to_string(),
                    expected_output: "3".to_string(),
                    hidden: false,
                },
                TestCase {
                    input: "9 9".to_string(),
                    expected_output: "18".to_string(),
                    hidden: true,
                },
            ],
        }
    }

    fn make_result(hidden: bool) -> SubmissionResult {
        SubmissionResult {
            console: "out".to_string(),
            user_output: "3".to_string(),
            error: String::new(),
            correct_output: "3".to_string(),
            correct: true,
            hidden,
        }
    }

    fn make_submission() -> Submission {
        Submission {
            player_code: PlayerCode::new("x", Language::Python),
            problem_index: 0,
            results: vec![make_result(false), make_result(true)],
            start_time: 42,
            num_correct: 2,
            num_test_cases: 2,
            runtime_millis: Some(3.5),
            compilation_error: None,
        }
    }

    #[test]
    fn owner_view_reverses_results_without_redaction() {
        let dto = SubmissionDto::owner_view(&make_submission());
        assert_eq!(dto.results.len(), 2);
        // Last received comes first.
        assert!(dto.results[0].hidden);
        assert_eq!(dto.results[0].correct_output, "3");
        assert_eq!(dto.results[1].correct_output, "3");
    }

    #[test]
    fn viewer_view_redacts_hidden_cases_only() {
        let dto = SubmissionDto::viewer_view(&make_submission());
        assert_eq!(dto.results[0].correct_output, "3");
        assert_eq!(dto.results[1].correct_output, "");
        assert_eq!(dto.results[1].user_output, "");
        assert_eq!(dto.results[1].console, "");
        // Verdict survives redaction.
        assert!(dto.results[1].correct);
    }

    #[test]
    fn game_dto_lists_players_in_leaderboard_order() {
        let mut room = Room::new(
            generate_room_code(),
            User::new("Alice"),
            RoomSettings::default(),
        );
        room.add_user(User::new("Bob"));
        let bob_id = room.users()[1].user_id;
        let mut session = GameSession::from_room(&room, vec![make_problem()]).unwrap();

        session
            .apply_submission(&bob_id, make_submission())
            .unwrap();

        let dto = GameDto::from_session(&session);
        assert_eq!(dto.players.len(), 2);
        assert_eq!(dto.players[0].user.nickname, "Bob");
        assert_eq!(dto.players[0].best_num_correct, Some(2));
        assert_eq!(dto.players[1].best_num_correct, None);
    }

    #[test]
    fn room_dto_resolves_host() {
        let room = Room::new(
            generate_room_code(),
            User::new("Alice"),
            RoomSettings::default(),
        );
        let dto = RoomDto::from_room(&room);
        assert_eq!(dto.host.unwrap().nickname, "Alice");
        assert_eq!(dto.users.len(), 1);
        assert!(!dto.active);
    }
}

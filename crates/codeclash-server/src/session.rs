use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use codeclash_core::game::{EndCause, GameError, GameSession};
use codeclash_core::net::messages::{
    GameDto, GameEndMsg, NotificationMsg, ServerMessage, SubmissionDto,
};
use codeclash_core::notification::{GameNotification, NotificationType};
use codeclash_core::player::PlayerCode;
use codeclash_core::submission::Submission;
use codeclash_core::tester::{TesterClient, TesterError, TesterRequest};
use codeclash_core::time::epoch_millis;

use crate::broadcast::Broadcaster;
use crate::error::EngineError;
use crate::report::{GameReport, ReportSink};
use crate::scorer;
use crate::timer::TimerSpec;

/// Trailing fully-correct submissions needed for a streak callout.
const STREAK_THRESHOLD: usize = 3;

/// Commands sent from transports and timers to a session actor. The
/// actor owns its `GameSession` exclusively; every mutation goes
/// through this channel.
#[derive(Debug)]
pub enum GameCommand {
    Submit {
        user_id: Uuid,
        problem_index: usize,
        code: PlayerCode,
        respond: oneshot::Sender<Result<SubmissionDto, EngineError>>,
    },
    /// Like `Submit` but the verdict is never recorded in the standings.
    TestRun {
        user_id: Uuid,
        problem_index: usize,
        code: PlayerCode,
        respond: oneshot::Sender<Result<SubmissionDto, EngineError>>,
    },
    /// Completed tester round-trip re-entering the actor. Internal.
    ApplyScore {
        user_id: Uuid,
        outcome: Result<Submission, TesterError>,
        record: bool,
        respond: oneshot::Sender<Result<SubmissionDto, EngineError>>,
    },
    UpdateCode {
        user_id: Uuid,
        code: PlayerCode,
    },
    PlayerLeft {
        user_id: Uuid,
    },
    /// A disconnected player re-attached under a fresh session token.
    PlayerRejoined {
        user_id: Uuid,
        session_id: String,
    },
    /// Room host migrated mid-game; host-only checks follow the live room.
    HostChanged {
        user_id: Uuid,
    },
    ManualEnd {
        requester_id: Uuid,
        respond: oneshot::Sender<Result<(), EngineError>>,
    },
    TimeUp,
    TimeRemaining {
        remaining_secs: u64,
    },
    Snapshot {
        respond: oneshot::Sender<Box<GameDto>>,
    },
    Stop {
        play_again: bool,
    },
}

/// Shared services a session actor needs.
pub struct SessionDeps {
    pub tester: Arc<dyn TesterClient>,
    pub broadcaster: Arc<Broadcaster>,
    pub report_sink: ReportSink,
    /// Set once the session reaches a terminal state; read by the
    /// registry without going through the command channel.
    pub ended_flag: Arc<AtomicBool>,
}

/// Handle to a running session actor.
pub struct SessionHandle {
    pub cmd_tx: mpsc::UnboundedSender<GameCommand>,
    pub cancel: CancellationToken,
    pub task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn send(&self, cmd: GameCommand) {
        if let Err(e) = self.cmd_tx.send(cmd) {
            tracing::debug!(error = %e, "Game session gone");
        }
    }
}

/// Spawn a session actor with its timer tasks armed.
pub fn spawn_game_session(
    session: GameSession,
    timer: &TimerSpec,
    deps: SessionDeps,
) -> SessionHandle {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    timer.arm(cmd_tx.clone(), cancel.clone());
    let task = tokio::spawn(run_session(
        session,
        cmd_rx,
        cmd_tx.clone(),
        deps,
        cancel.clone(),
    ));
    SessionHandle {
        cmd_tx,
        cancel,
        task,
    }
}

fn notification_msg(notification: GameNotification) -> ServerMessage {
    ServerMessage::Notification(NotificationMsg { notification })
}

fn snapshot_msg(session: &GameSession) -> ServerMessage {
    ServerMessage::GameSnapshot(Box::new(GameDto::from_session(session)))
}

async fn run_session(
    mut session: GameSession,
    mut cmd_rx: mpsc::UnboundedReceiver<GameCommand>,
    cmd_tx: mpsc::UnboundedSender<GameCommand>,
    deps: SessionDeps,
    cancel: CancellationToken,
) {
    tracing::info!(
        room = %session.room.room_id,
        players = session.players.len(),
        problems = session.problems().len(),
        duration_secs = session.timer.duration_secs,
        "Game session started"
    );

    deps.broadcaster.broadcast(&snapshot_msg(&session));
    deps.broadcaster
        .broadcast(&notification_msg(GameNotification::system(
            NotificationType::GameStart,
            None,
        )));

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            GameCommand::Submit {
                user_id,
                problem_index,
                code,
                respond,
            } => {
                start_attempt(
                    &mut session,
                    &deps,
                    &cmd_tx,
                    user_id,
                    problem_index,
                    code,
                    true,
                    respond,
                );
            },
            GameCommand::TestRun {
                user_id,
                problem_index,
                code,
                respond,
            } => {
                start_attempt(
                    &mut session,
                    &deps,
                    &cmd_tx,
                    user_id,
                    problem_index,
                    code,
                    false,
                    respond,
                );
            },
            GameCommand::ApplyScore {
                user_id,
                outcome,
                record,
                respond,
            } => {
                apply_score(&mut session, &deps, &cancel, user_id, outcome, record, respond);
            },
            GameCommand::UpdateCode { user_id, code } => {
                if let Err(e) = session.update_code(&user_id, code) {
                    tracing::debug!(user_id = %user_id, error = %e, "Code update ignored");
                }
            },
            GameCommand::PlayerLeft { user_id } => {
                if session.mark_player_left(&user_id).is_ok() {
                    let nickname = session
                        .player(&user_id)
                        .map(|p| p.user.nickname.clone())
                        .unwrap_or_default();
                    deps.broadcaster.broadcast(&snapshot_msg(&session));
                    deps.broadcaster
                        .broadcast(&notification_msg(GameNotification::from_player(
                            nickname,
                            NotificationType::PlayerLeave,
                            None,
                        )));
                }
            },
            GameCommand::PlayerRejoined {
                user_id,
                session_id,
            } => {
                if session.mark_player_rejoined(&user_id, session_id).is_ok() {
                    deps.broadcaster.broadcast(&snapshot_msg(&session));
                }
            },
            GameCommand::HostChanged { user_id } => {
                session.room.host_id = user_id;
            },
            GameCommand::ManualEnd {
                requester_id,
                respond,
            } => {
                if requester_id != session.room.host_id {
                    let _ = respond.send(Err(EngineError::forbidden(
                        "not_host",
                        "only the host can end the game",
                    )));
                } else if session.is_ended() {
                    let _ = respond.send(Err(GameError::SessionEnded.into()));
                } else {
                    end_session(&mut session, EndCause::HostEnded, &deps, &cancel);
                    let _ = respond.send(Ok(()));
                }
            },
            GameCommand::TimeUp => {
                end_session(&mut session, EndCause::TimeExpired, &deps, &cancel);
            },
            GameCommand::TimeRemaining { remaining_secs } => {
                if !session.is_ended() {
                    deps.broadcaster
                        .broadcast(&notification_msg(GameNotification::system(
                            NotificationType::TimeLeft,
                            Some(remaining_secs.to_string()),
                        )));
                }
            },
            GameCommand::Snapshot { respond } => {
                let _ = respond.send(Box::new(GameDto::from_session(&session)));
            },
            GameCommand::Stop { play_again } => {
                if !session.is_ended() {
                    end_session(&mut session, EndCause::HostEnded, &deps, &cancel);
                }
                if play_again {
                    session.play_again = true;
                    deps.broadcaster.broadcast(&snapshot_msg(&session));
                }
                break;
            },
        }
    }

    cancel.cancel();
    tracing::debug!(room = %session.room.room_id, "Game session actor stopped");
}

/// Validate an attempt and hand the tester round-trip to a spawned
/// task. The actor never awaits the tester itself; the verdict comes
/// back as an `ApplyScore` command.
#[allow(clippy::too_many_arguments)]
fn start_attempt(
    session: &mut GameSession,
    deps: &SessionDeps,
    cmd_tx: &mpsc::UnboundedSender<GameCommand>,
    user_id: Uuid,
    problem_index: usize,
    code: PlayerCode,
    record: bool,
    respond: oneshot::Sender<Result<SubmissionDto, EngineError>>,
) {
    if record && session.is_ended() {
        let _ = respond.send(Err(GameError::SessionEnded.into()));
        return;
    }
    let problem = match session.problem(problem_index) {
        Ok(p) => p.clone(),
        Err(e) => {
            let _ = respond.send(Err(e.into()));
            return;
        },
    };
    if let Err(e) = session.update_code(&user_id, code.clone()) {
        let _ = respond.send(Err(e.into()));
        return;
    }

    let start_time = epoch_millis();
    let request = TesterRequest {
        code: code.code.clone(),
        language: code.language,
        problem,
    };
    let tester = Arc::clone(&deps.tester);
    let tx = cmd_tx.clone();
    tokio::spawn(async move {
        let outcome = tester
            .evaluate(request)
            .await
            .map(|resp| scorer::build_submission(code, problem_index, start_time, resp));
        let _ = tx.send(GameCommand::ApplyScore {
            user_id,
            outcome,
            record,
            respond,
        });
    });
}

fn apply_score(
    session: &mut GameSession,
    deps: &SessionDeps,
    cancel: &CancellationToken,
    user_id: Uuid,
    outcome: Result<Submission, TesterError>,
    record: bool,
    respond: oneshot::Sender<Result<SubmissionDto, EngineError>>,
) {
    let submission = match outcome {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "Tester round-trip failed");
            let _ = respond.send(Err(e.into()));
            return;
        },
    };
    let correct = submission.is_correct();
    let score = format!("{}/{}", submission.num_correct, submission.num_test_cases);

    if !record {
        let nickname = session.player(&user_id).map(|p| p.user.nickname.clone());
        let _ = respond.send(Ok(SubmissionDto::owner_view(&submission)));
        if correct && let Ok(nickname) = nickname {
            deps.broadcaster
                .broadcast(&notification_msg(GameNotification::from_player(
                    nickname,
                    NotificationType::TestCorrect,
                    Some(score),
                )));
        }
        return;
    }

    if let Err(e) = session.apply_submission(&user_id, submission.clone()) {
        let _ = respond.send(Err(e.into()));
        return;
    }
    let _ = respond.send(Ok(SubmissionDto::owner_view(&submission)));

    // Standings changed: push the snapshot before the event callouts so
    // subscribers never see a notification ahead of the state behind it.
    deps.broadcaster.broadcast(&snapshot_msg(session));
    if let Ok(player) = session.player(&user_id) {
        let nickname = player.user.nickname.clone();
        let streak = player.correct_streak();
        let notification_type = if correct {
            NotificationType::SubmissionCorrect
        } else {
            NotificationType::SubmissionIncorrect
        };
        deps.broadcaster
            .broadcast(&notification_msg(GameNotification::from_player(
                nickname.clone(),
                notification_type,
                Some(score),
            )));
        if correct && streak >= STREAK_THRESHOLD {
            deps.broadcaster
                .broadcast(&notification_msg(GameNotification::from_player(
                    nickname,
                    NotificationType::CodeStreak,
                    Some(streak.to_string()),
                )));
        }
    }

    if session.all_solved {
        end_session(session, EndCause::AllSolved, deps, cancel);
    }
}

/// Terminal sequence. The report guard makes this idempotent under
/// racing end triggers: exactly one caller finalizes, broadcasts the
/// end frames, and emits the report.
fn end_session(
    session: &mut GameSession,
    cause: EndCause,
    deps: &SessionDeps,
    cancel: &CancellationToken,
) {
    if !session.begin_report() {
        return;
    }
    session.finalize(cause);
    deps.ended_flag.store(true, Ordering::SeqCst);
    cancel.cancel();

    let dto = GameDto::from_session(session);
    let leaderboard = dto.players.clone();
    deps.broadcaster
        .broadcast(&ServerMessage::GameSnapshot(Box::new(dto)));
    deps.broadcaster
        .broadcast(&ServerMessage::GameEnd(GameEndMsg { cause, leaderboard }));
    deps.broadcaster
        .broadcast(&notification_msg(GameNotification::system(
            NotificationType::GameOver,
            None,
        )));

    tracing::info!(room = %session.room.room_id, cause = ?cause, "Game session ended");
    if deps
        .report_sink
        .send(GameReport::from_session(session, cause))
        .is_err()
    {
        tracing::warn!(room = %session.room.room_id, "Report sink closed, report dropped");
    }
}

use std::collections::HashMap;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::player::{Player, PlayerCode, PlayerColor};
use crate::problem::Problem;
use crate::room::Room;
use crate::submission::Submission;
use crate::time::epoch_millis;
use crate::user::User;

/// Why a session reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndCause {
    TimeExpired,
    AllSolved,
    HostEnded,
}

/// Failures raised by session construction and mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    NoEligiblePlayers,
    NoProblems,
    ZeroDuration,
    UnknownPlayer(Uuid),
    ProblemIndexOutOfRange { index: usize, count: usize },
    SessionEnded,
}

impl std::fmt::Display for GameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoEligiblePlayers => write!(f, "room has no eligible players"),
            Self::NoProblems => write!(f, "session requires at least one problem"),
            Self::ZeroDuration => write!(f, "timer duration must be non-zero"),
            Self::UnknownPlayer(id) => write!(f, "player {id} is not part of this session"),
            Self::ProblemIndexOutOfRange { index, count } => {
                write!(f, "problem index {index} out of range (session has {count})")
            },
            Self::SessionEnded => write!(f, "session has already ended"),
        }
    }
}

impl std::error::Error for GameError {}

/// Wall-clock timer for one session. `time_up` transitions false→true
/// at most once and never back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameTimer {
    /// Epoch millis at game start.
    pub start_time: u64,
    pub duration_secs: u64,
    time_up: bool,
}

impl GameTimer {
    pub fn new(duration_secs: u64) -> Result<Self, GameError> {
        if duration_secs == 0 {
            return Err(GameError::ZeroDuration);
        }
        Ok(Self {
            start_time: epoch_millis(),
            duration_secs,
            time_up: false,
        })
    }

    pub fn end_time(&self) -> u64 {
        self.start_time + self.duration_secs * 1000
    }

    pub fn is_time_up(&self) -> bool {
        self.time_up
    }

    /// Monotonic: once up, always up.
    pub fn mark_time_up(&mut self) {
        self.time_up = true;
    }
}

/// The authoritative in-memory state of one timed competitive run. The
/// problem list and player map are snapshotted at start time: later
/// room membership changes never add or remove players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub room: Room,
    problems: Vec<Problem>,
    pub players: HashMap<Uuid, Player>,
    pub timer: GameTimer,
    /// Host requested a rematch; the session is logically replaced.
    pub play_again: bool,
    pub all_solved: bool,
    /// Host-triggered early stop.
    pub game_ended: bool,
    /// Idempotence guard for report generation; see `begin_report`.
    report_started: bool,
    pub end_cause: Option<EndCause>,
}

impl GameSession {
    /// Build a session from a room. Every non-spectator user becomes a
    /// player; colors come from the palette in shuffled order.
    pub fn from_room(room: &Room, problems: Vec<Problem>) -> Result<Self, GameError> {
        if problems.is_empty() {
            return Err(GameError::NoProblems);
        }
        let eligible: Vec<&User> = room.eligible_players().collect();
        if eligible.is_empty() {
            return Err(GameError::NoEligiblePlayers);
        }
        let timer = GameTimer::new(room.settings.duration_secs)?;

        let mut palette: Vec<PlayerColor> = PlayerColor::PALETTE.to_vec();
        palette.shuffle(&mut rand::rng());
        let players = eligible
            .iter()
            .enumerate()
            .map(|(i, user)| {
                let color = palette[i % palette.len()];
                (
                    user.user_id,
                    Player::new((*user).clone(), problems.len(), color),
                )
            })
            .collect();

        Ok(Self {
            room: room.clone(),
            problems,
            players,
            timer,
            play_again: false,
            all_solved: false,
            game_ended: false,
            report_started: false,
            end_cause: None,
        })
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn problem(&self, index: usize) -> Result<&Problem, GameError> {
        self.problems
            .get(index)
            .ok_or(GameError::ProblemIndexOutOfRange {
                index,
                count: self.problems.len(),
            })
    }

    pub fn player(&self, user_id: &Uuid) -> Result<&Player, GameError> {
        self.players
            .get(user_id)
            .ok_or(GameError::UnknownPlayer(*user_id))
    }

    pub fn player_mut(&mut self, user_id: &Uuid) -> Result<&mut Player, GameError> {
        self.players
            .get_mut(user_id)
            .ok_or(GameError::UnknownPlayer(*user_id))
    }

    pub fn is_ended(&self) -> bool {
        self.end_cause.is_some()
    }

    /// Replace a player's current editor contents.
    pub fn update_code(&mut self, user_id: &Uuid, code: PlayerCode) -> Result<(), GameError> {
        self.player_mut(user_id)?.code = code;
        Ok(())
    }

    /// Mark a session player as disconnected. The player slot itself is
    /// retained: membership was snapshotted at start time.
    pub fn mark_player_left(&mut self, user_id: &Uuid) -> Result<(), GameError> {
        self.player_mut(user_id)?.user.session_id = None;
        Ok(())
    }

    /// Restore a reconnected player's connectivity under a fresh token.
    pub fn mark_player_rejoined(
        &mut self,
        user_id: &Uuid,
        session_id: String,
    ) -> Result<(), GameError> {
        self.player_mut(user_id)?.user.session_id = Some(session_id);
        Ok(())
    }

    /// Append a scored submission to the owning player and refresh the
    /// all-solved conjunction over every player's full solved array.
    /// All-or-nothing: validation happens before any mutation.
    pub fn apply_submission(
        &mut self,
        user_id: &Uuid,
        submission: Submission,
    ) -> Result<(), GameError> {
        if self.is_ended() {
            return Err(GameError::SessionEnded);
        }
        if submission.problem_index >= self.problems.len() {
            return Err(GameError::ProblemIndexOutOfRange {
                index: submission.problem_index,
                count: self.problems.len(),
            });
        }
        let player = self
            .players
            .get_mut(user_id)
            .ok_or(GameError::UnknownPlayer(*user_id))?;
        player.record_submission(submission);
        self.all_solved = self.players.values().all(Player::solved_all);
        Ok(())
    }

    /// Check-and-set the report guard. Returns true exactly once per
    /// session no matter how many end triggers race; the first caller
    /// owns report generation.
    pub fn begin_report(&mut self) -> bool {
        if self.report_started {
            return false;
        }
        self.report_started = true;
        true
    }

    /// Record the terminal cause and its flag. The first recorded cause
    /// wins; the time-up flag stays monotonic either way.
    pub fn finalize(&mut self, cause: EndCause) {
        match cause {
            EndCause::TimeExpired => self.timer.mark_time_up(),
            EndCause::HostEnded => self.game_ended = true,
            EndCause::AllSolved => {},
        }
        if self.end_cause.is_none() {
            self.end_cause = Some(cause);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlayerCode;
    use crate::problem::{Difficulty, Language, TestCase};
    use crate::room::{RoomSettings, generate_room_code};

    fn make_problem(num_cases: usize) -> Problem {
        Problem {
            problem_id: Uuid::new_v4(),
            name: "Sum".to_string(),
            description: "Add two numbers".to_string(),
            difficulty: Difficulty::Easy,
            test_cases: (0..num_cases)
                .map(|i| TestCase {
                    input: format!("{i} {i}"),
                    expected_output: format!("{}", i * 2),
                    hidden: false,
                })
                .collect(),
        }
    }

    fn make_room(nicknames: &[&str]) -> Room {
        let mut users = nicknames.iter().map(|n| User::new(*n));
        let mut room = Room::new(
            generate_room_code(),
            users.next().expect("at least one user"),
            RoomSettings::default(),
        );
        for user in users {
            room.add_user(user);
        }
        room
    }

    fn make_submission(problem_index: usize, num_correct: u32, total: u32) -> Submission {
        Submission {
            player_code: PlayerCode::new("x", Language::Python),
            problem_index,
            results: Vec::new(),
            start_time: epoch_millis(),
            num_correct,
            num_test_cases: total,
            runtime_millis: None,
            compilation_error: None,
        }
    }

    #[test]
    fn from_room_builds_player_per_eligible_user() {
        let mut room = make_room(&["Alice", "Bob"]);
        room.add_user(User::spectator("Watcher"));
        let session = GameSession::from_room(&room, vec![make_problem(2)]).unwrap();
        assert_eq!(session.players.len(), 2);
        for player in session.players.values() {
            assert_eq!(player.solved.len(), 1);
            assert!(!player.user.spectator);
        }
    }

    #[test]
    fn from_room_rejects_spectator_only_room() {
        let mut room = make_room(&["Alice"]);
        let alice = room.users()[0].clone();
        room.add_user(User::spectator("Watcher"));
        room.remove_user(&alice);
        let result = GameSession::from_room(&room, vec![make_problem(1)]);
        assert_eq!(result.unwrap_err(), GameError::NoEligiblePlayers);
    }

    #[test]
    fn from_room_rejects_empty_problem_list() {
        let room = make_room(&["Alice"]);
        let result = GameSession::from_room(&room, Vec::new());
        assert_eq!(result.unwrap_err(), GameError::NoProblems);
    }

    #[test]
    fn timer_rejects_zero_duration() {
        assert_eq!(GameTimer::new(0).unwrap_err(), GameError::ZeroDuration);
    }

    #[test]
    fn timer_end_time_derives_from_start() {
        let timer = GameTimer::new(300).unwrap();
        assert_eq!(timer.end_time(), timer.start_time + 300_000);
    }

    #[test]
    fn time_up_is_monotonic() {
        let mut timer = GameTimer::new(60).unwrap();
        assert!(!timer.is_time_up());
        timer.mark_time_up();
        timer.mark_time_up();
        assert!(timer.is_time_up());
    }

    #[test]
    fn apply_submission_updates_solved_and_all_solved() {
        let room = make_room(&["Alice"]);
        let alice_id = room.users()[0].user_id;
        let mut session = GameSession::from_room(&room, vec![make_problem(3)]).unwrap();

        session
            .apply_submission(&alice_id, make_submission(0, 2, 3))
            .unwrap();
        assert!(!session.players[&alice_id].solved[0]);
        assert!(!session.all_solved);

        session
            .apply_submission(&alice_id, make_submission(0, 3, 3))
            .unwrap();
        assert!(session.players[&alice_id].solved[0]);
        assert!(session.all_solved);
    }

    #[test]
    fn all_solved_requires_every_player() {
        let room = make_room(&["Alice", "Bob"]);
        let alice_id = room.users()[0].user_id;
        let mut session = GameSession::from_room(&room, vec![make_problem(1)]).unwrap();

        session
            .apply_submission(&alice_id, make_submission(0, 1, 1))
            .unwrap();
        assert!(!session.all_solved);
    }

    #[test]
    fn submission_for_unknown_player_fails() {
        let room = make_room(&["Alice"]);
        let mut session = GameSession::from_room(&room, vec![make_problem(1)]).unwrap();
        let stranger = Uuid::new_v4();
        let err = session
            .apply_submission(&stranger, make_submission(0, 1, 1))
            .unwrap_err();
        assert_eq!(err, GameError::UnknownPlayer(stranger));
    }

    #[test]
    fn submission_out_of_range_index_fails_without_mutation() {
        let room = make_room(&["Alice"]);
        let alice_id = room.users()[0].user_id;
        let mut session = GameSession::from_room(&room, vec![make_problem(1)]).unwrap();
        let err = session
            .apply_submission(&alice_id, make_submission(5, 1, 1))
            .unwrap_err();
        assert!(matches!(err, GameError::ProblemIndexOutOfRange { .. }));
        assert!(session.players[&alice_id].submissions.is_empty());
    }

    #[test]
    fn submission_after_end_fails() {
        let room = make_room(&["Alice"]);
        let alice_id = room.users()[0].user_id;
        let mut session = GameSession::from_room(&room, vec![make_problem(1)]).unwrap();
        session.finalize(EndCause::HostEnded);
        let err = session
            .apply_submission(&alice_id, make_submission(0, 1, 1))
            .unwrap_err();
        assert_eq!(err, GameError::SessionEnded);
    }

    #[test]
    fn begin_report_fires_exactly_once() {
        let room = make_room(&["Alice"]);
        let mut session = GameSession::from_room(&room, vec![make_problem(1)]).unwrap();
        assert!(session.begin_report());
        assert!(!session.begin_report());
        assert!(!session.begin_report());
    }

    #[test]
    fn finalize_records_first_cause_only() {
        let room = make_room(&["Alice"]);
        let mut session = GameSession::from_room(&room, vec![make_problem(1)]).unwrap();
        session.finalize(EndCause::HostEnded);
        session.finalize(EndCause::TimeExpired);
        assert_eq!(session.end_cause, Some(EndCause::HostEnded));
        assert!(session.game_ended);
        // The late timer trigger still marks time as up.
        assert!(session.timer.is_time_up());
    }

    #[test]
    fn membership_changes_do_not_touch_player_map() {
        let mut room = make_room(&["Alice", "Bob"]);
        let session = GameSession::from_room(&room, vec![make_problem(1)]).unwrap();
        let bob = room.users()[1].clone();
        room.remove_user(&bob);
        room.add_user(User::new("Carol"));
        assert_eq!(session.players.len(), 2);
        assert!(session.players.contains_key(&bob.user_id));
    }

    #[test]
    fn mark_player_left_keeps_slot() {
        let room = make_room(&["Alice"]);
        let alice_id = room.users()[0].user_id;
        let mut session = GameSession::from_room(&room, vec![make_problem(1)]).unwrap();
        session.players.get_mut(&alice_id).unwrap().user.session_id = Some("s".to_string());

        session.mark_player_left(&alice_id).unwrap();
        let player = &session.players[&alice_id];
        assert!(!player.user.is_active());
        assert_eq!(session.players.len(), 1);
    }

    #[test]
    fn rejoin_restores_connectivity_with_new_token() {
        let room = make_room(&["Alice"]);
        let alice_id = room.users()[0].user_id;
        let mut session = GameSession::from_room(&room, vec![make_problem(1)]).unwrap();
        session.mark_player_left(&alice_id).unwrap();

        session
            .mark_player_rejoined(&alice_id, "fresh".to_string())
            .unwrap();
        let player = &session.players[&alice_id];
        assert!(player.user.is_active());
        assert_eq!(player.user.session_id.as_deref(), Some("fresh"));
    }
}

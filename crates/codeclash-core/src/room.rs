use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::problem::Difficulty;
use crate::user::User;

/// Maximum selectable room size. `MAX_SIZE + 1` is the sentinel for
/// "unbounded".
pub const MAX_SIZE: usize = 30;

pub const MIN_DURATION_SECS: u64 = 60;
pub const MAX_DURATION_SECS: u64 = 3600;
pub const MAX_NUM_PROBLEMS: usize = 10;

const ROOM_CODE_LEN: usize = 6;
// No 0/O/1/I to keep codes readable over voice chat.
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a random room code.
pub fn generate_room_code() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN && code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b))
}

/// Room-level game parameters. Invalid values are rejected with a typed
/// error, never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSettings {
    pub difficulty: Difficulty,
    pub duration_secs: u64,
    pub size: usize,
    pub num_problems: usize,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Random,
            duration_secs: 900,
            size: 10,
            num_problems: 1,
        }
    }
}

/// Reasons a settings payload is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsError {
    DurationOutOfRange,
    SizeOutOfRange,
    NumProblemsOutOfRange,
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DurationOutOfRange => write!(
                f,
                "duration must be between {MIN_DURATION_SECS} and {MAX_DURATION_SECS} seconds"
            ),
            Self::SizeOutOfRange => {
                write!(f, "room size must be between 1 and {}", MAX_SIZE + 1)
            },
            Self::NumProblemsOutOfRange => {
                write!(f, "problem count must be between 1 and {MAX_NUM_PROBLEMS}")
            },
        }
    }
}

impl std::error::Error for SettingsError {}

impl RoomSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&self.duration_secs) {
            return Err(SettingsError::DurationOutOfRange);
        }
        if self.size == 0 || self.size > MAX_SIZE + 1 {
            return Err(SettingsError::SizeOutOfRange);
        }
        if self.num_problems == 0 || self.num_problems > MAX_NUM_PROBLEMS {
            return Err(SettingsError::NumProblemsOutOfRange);
        }
        Ok(())
    }
}

/// A persistent lobby grouping users before and after a game. The user
/// list is mutated exclusively through `add_user`/`remove_user` so the
/// host reference stays consistent with membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: String,
    pub host_id: Uuid,
    users: Vec<User>,
    pub settings: RoomSettings,
    /// True while a game session is live in this room.
    pub active: bool,
}

impl Room {
    pub fn new(room_id: String, host: User, settings: RoomSettings) -> Self {
        let host_id = host.user_id;
        Self {
            room_id,
            host_id,
            users: vec![host],
            settings,
            active: false,
        }
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn add_user(&mut self, user: User) {
        self.users.push(user);
    }

    /// Remove by logical equality. Removing a non-member is a no-op
    /// returning false. If the host leaves, the first remaining user
    /// inherits the host slot.
    pub fn remove_user(&mut self, probe: &User) -> bool {
        let Some(pos) = self.users.iter().position(|u| u.matches(probe)) else {
            return false;
        };
        let removed = self.users.remove(pos);
        if removed.user_id == self.host_id
            && let Some(next) = self.users.first()
        {
            self.host_id = next.user_id;
        }
        true
    }

    /// Resolve a client-supplied probe to the room's canonical instance.
    /// A probe is never identity-equal to the persisted user, so lookup
    /// goes through logical equality.
    pub fn equivalent_user(&self, probe: &User) -> Option<&User> {
        self.users.iter().find(|u| u.matches(probe))
    }

    pub fn equivalent_user_mut(&mut self, probe: &User) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.matches(probe))
    }

    /// Case-sensitive exact match.
    pub fn contains_nickname(&self, nickname: &str) -> bool {
        self.users.iter().any(|u| u.nickname == nickname)
    }

    pub fn is_full(&self) -> bool {
        self.settings.size != MAX_SIZE + 1 && self.users.len() >= self.settings.size
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn host(&self) -> Option<&User> {
        self.users.iter().find(|u| u.user_id == self.host_id)
    }

    pub fn eligible_players(&self) -> impl Iterator<Item = &User> {
        self.users.iter().filter(|u| !u.spectator)
    }

    /// Clear every spectator flag, typically between games so mid-game
    /// joiners participate in the next session.
    pub fn promote_spectators(&mut self) {
        for user in &mut self.users {
            user.spectator = false;
        }
    }
}

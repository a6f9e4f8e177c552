use codeclash_core::game::GameError;
use codeclash_core::room::SettingsError;
use codeclash_core::tester::TesterError;

/// Broad failure category, used by transports to pick a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Forbidden,
    Conflict,
    Dependency,
}

/// Engine-level error surfaced to callers. `code` is a stable
/// machine-readable token; `message` is for humans.
#[derive(Debug)]
pub struct EngineError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
}

impl EngineError {
    pub fn invalid_input(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            code,
            message: message.into(),
        }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::NotFound,
            code,
            message: message.into(),
        }
    }

    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Forbidden,
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Conflict,
            code,
            message: message.into(),
        }
    }

    pub fn dependency(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Dependency,
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for EngineError {}

impl From<GameError> for EngineError {
    fn from(e: GameError) -> Self {
        match &e {
            GameError::NoEligiblePlayers => Self::conflict("no_eligible_players", e.to_string()),
            GameError::NoProblems => Self::invalid_input("no_problems", e.to_string()),
            GameError::ZeroDuration => Self::invalid_input("zero_duration", e.to_string()),
            GameError::UnknownPlayer(_) => Self::not_found("unknown_player", e.to_string()),
            GameError::ProblemIndexOutOfRange { .. } => {
                Self::invalid_input("problem_index_out_of_range", e.to_string())
            },
            GameError::SessionEnded => Self::conflict("session_ended", e.to_string()),
        }
    }
}

impl From<SettingsError> for EngineError {
    fn from(e: SettingsError) -> Self {
        Self::invalid_input("invalid_settings", e.to_string())
    }
}

impl From<TesterError> for EngineError {
    fn from(e: TesterError) -> Self {
        Self::dependency("tester_failed", e.to_string())
    }
}

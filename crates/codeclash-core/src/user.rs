use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user known to a room. `session_id` is the single source of truth
/// for connectivity: the user is active iff it is set. `user_id` is
/// stable across reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub nickname: String,
    pub session_id: Option<String>,
    pub spectator: bool,
}

impl User {
    pub fn new(nickname: impl Into<String>) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            nickname: nickname.into(),
            session_id: None,
            spectator: false,
        }
    }

    pub fn spectator(nickname: impl Into<String>) -> Self {
        Self {
            spectator: true,
            ..Self::new(nickname)
        }
    }

    pub fn is_active(&self) -> bool {
        self.session_id.is_some()
    }

    /// Logical identity for matching a client-supplied probe against the
    /// room's canonical instance. Distinct from `PartialEq`: a probe
    /// carrying only the nickname or only the id still matches.
    /// Nickname comparison is case-sensitive.
    pub fn matches(&self, probe: &User) -> bool {
        self.user_id == probe.user_id || self.nickname == probe.nickname
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_iff_session_id_set() {
        let mut user = User::new("Alice");
        assert!(!user.is_active());
        user.session_id = Some("sess-1".to_string());
        assert!(user.is_active());
        user.session_id = None;
        assert!(!user.is_active());
    }

    #[test]
    fn matches_by_nickname() {
        let canonical = User::new("Alice");
        let probe = User::new("Alice");
        assert_ne!(canonical, probe); // different ids
        assert!(canonical.matches(&probe));
    }

    #[test]
    fn matches_by_id() {
        let canonical = User::new("Alice");
        let mut probe = User::new("");
        probe.user_id = canonical.user_id;
        assert!(canonical.matches(&probe));
    }

    #[test]
    fn nickname_matching_is_case_sensitive() {
        let canonical = User::new("Alice");
        let probe = User::new("alice");
        assert!(!canonical.matches(&probe));
    }
}

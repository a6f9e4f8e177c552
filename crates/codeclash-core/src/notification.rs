use serde::{Deserialize, Serialize};

use crate::time::epoch_millis;

/// Recognized notification events for a room channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    SubmissionCorrect,
    SubmissionIncorrect,
    TestCorrect,
    CodeStreak,
    TimeLeft,
    GameStart,
    GameOver,
    PlayerLeave,
}

impl NotificationType {
    /// Tagged parse; bad input is a `None`, never a panic.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "submission_correct" => Some(Self::SubmissionCorrect),
            "submission_incorrect" => Some(Self::SubmissionIncorrect),
            "test_correct" => Some(Self::TestCorrect),
            "code_streak" => Some(Self::CodeStreak),
            "time_left" => Some(Self::TimeLeft),
            "game_start" => Some(Self::GameStart),
            "game_over" => Some(Self::GameOver),
            "player_leave" => Some(Self::PlayerLeave),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubmissionCorrect => "submission_correct",
            Self::SubmissionIncorrect => "submission_incorrect",
            Self::TestCorrect => "test_correct",
            Self::CodeStreak => "code_streak",
            Self::TimeLeft => "time_left",
            Self::GameStart => "game_start",
            Self::GameOver => "game_over",
            Self::PlayerLeave => "player_leave",
        }
    }
}

/// A discrete event pushed to every subscriber of a room channel.
/// `initiator` is the acting player's nickname, or None for
/// system-generated notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameNotification {
    pub initiator: Option<String>,
    /// Epoch millis at creation.
    pub time: u64,
    pub notification_type: NotificationType,
    pub content: Option<String>,
}

impl GameNotification {
    pub fn system(notification_type: NotificationType, content: Option<String>) -> Self {
        Self {
            initiator: None,
            time: epoch_millis(),
            notification_type,
            content,
        }
    }

    pub fn from_player(
        nickname: impl Into<String>,
        notification_type: NotificationType,
        content: Option<String>,
    ) -> Self {
        Self {
            initiator: Some(nickname.into()),
            time: epoch_millis(),
            notification_type,
            content,
        }
    }
}

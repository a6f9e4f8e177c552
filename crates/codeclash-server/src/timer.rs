use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use codeclash_core::game::GameError;

use crate::session::GameCommand;

/// Validated timer plan for one session: a hard deadline plus optional
/// remaining-time warning marks. Marks at or past the full duration are
/// discarded at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerSpec {
    duration_secs: u64,
    warning_marks: Vec<u64>,
}

impl TimerSpec {
    pub fn new(duration_secs: u64, warning_marks: &[u64]) -> Result<Self, GameError> {
        if duration_secs == 0 {
            return Err(GameError::ZeroDuration);
        }
        let mut marks: Vec<u64> = warning_marks
            .iter()
            .copied()
            .filter(|&m| m > 0 && m < duration_secs)
            .collect();
        marks.sort_unstable_by(|a, b| b.cmp(a));
        marks.dedup();
        Ok(Self {
            duration_secs,
            warning_marks: marks,
        })
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn warning_marks(&self) -> &[u64] {
        &self.warning_marks
    }

    /// Spawn fire-once timer tasks: one `TimeRemaining` per warning mark
    /// and one final `TimeUp` at the deadline. All tasks abort when the
    /// token is cancelled, so an early session end leaves nothing behind.
    pub fn arm(&self, cmd_tx: mpsc::UnboundedSender<GameCommand>, cancel: CancellationToken) {
        for &mark in &self.warning_marks {
            let delay = Duration::from_secs(self.duration_secs - mark);
            let tx = cmd_tx.clone();
            let token = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = token.cancelled() => {},
                    () = tokio::time::sleep(delay) => {
                        let _ = tx.send(GameCommand::TimeRemaining { remaining_secs: mark });
                    },
                }
            });
        }

        let deadline = Duration::from_secs(self.duration_secs);
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {},
                () = tokio::time::sleep(deadline) => {
                    let _ = cmd_tx.send(GameCommand::TimeUp);
                },
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_duration() {
        assert_eq!(TimerSpec::new(0, &[]).unwrap_err(), GameError::ZeroDuration);
    }

    #[test]
    fn filters_and_orders_warning_marks() {
        let spec = TimerSpec::new(300, &[10, 600, 60, 300, 0, 10, 30]).unwrap();
        // Marks at or past the duration and zeros are gone; rest sorted
        // nearest-to-deadline last.
        assert_eq!(spec.warning_marks(), &[60, 30, 10]);
    }

    #[tokio::test(start_paused = true)]
    async fn fires_warnings_then_time_up() {
        let spec = TimerSpec::new(3, &[2, 1]).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        spec.arm(tx, CancellationToken::new());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(matches!(
            rx.recv().await,
            Some(GameCommand::TimeRemaining { remaining_secs: 2 })
        ));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(matches!(
            rx.recv().await,
            Some(GameCommand::TimeRemaining { remaining_secs: 1 })
        ));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(matches!(rx.recv().await, Some(GameCommand::TimeUp)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_silences_pending_fires() {
        let spec = TimerSpec::new(10, &[5]).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        spec.arm(tx, cancel.clone());

        cancel.cancel();
        tokio::time::advance(Duration::from_secs(20)).await;

        // Senders dropped without firing; channel closes with no commands.
        assert!(rx.recv().await.is_none());
    }
}

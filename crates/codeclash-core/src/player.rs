use serde::{Deserialize, Serialize};

use crate::problem::Language;
use crate::submission::Submission;
use crate::user::User;

/// A player's current editor contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerCode {
    pub code: String,
    pub language: Language,
}

impl PlayerCode {
    pub fn new(code: impl Into<String>, language: Language) -> Self {
        Self {
            code: code.into(),
            language,
        }
    }
}

/// Avatar color, assigned from a shuffled palette at game start so
/// repeat games vary cosmetically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Default for PlayerColor {
    fn default() -> Self {
        Self::PALETTE[0]
    }
}

impl PlayerColor {
    /// Predefined palette colors for player assignment.
    pub const PALETTE: &[PlayerColor] = &[
        PlayerColor {
            r: 255,
            g: 87,
            b: 87,
        }, // Red
        PlayerColor {
            r: 78,
            g: 205,
            b: 196,
        }, // Teal
        PlayerColor {
            r: 255,
            g: 195,
            b: 18,
        }, // Yellow
        PlayerColor {
            r: 130,
            g: 88,
            b: 255,
        }, // Purple
        PlayerColor {
            r: 46,
            g: 213,
            b: 115,
        }, // Green
        PlayerColor {
            r: 255,
            g: 148,
            b: 77,
        }, // Orange
        PlayerColor {
            r: 83,
            g: 152,
            b: 255,
        }, // Blue
        PlayerColor {
            r: 255,
            g: 107,
            b: 175,
        }, // Pink
    ];
}

/// A room user's in-game state during one session. Identity is the
/// wrapped user; everything else is session-local.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub user: User,
    pub code: PlayerCode,
    /// Append-only history, first-to-last.
    pub submissions: Vec<Submission>,
    /// Per-problem solved flags, sized to the session's problem count.
    pub solved: Vec<bool>,
    pub color: PlayerColor,
}

impl Player {
    pub fn new(user: User, num_problems: usize, color: PlayerColor) -> Self {
        Self {
            user,
            code: PlayerCode::new("", Language::Python),
            submissions: Vec::new(),
            solved: vec![false; num_problems],
            color,
        }
    }

    /// The submission with the highest `num_correct`; ties go to the
    /// earliest `start_time`. Pure fold over the append-only history.
    pub fn best_submission(&self) -> Option<&Submission> {
        self.submissions.iter().fold(None, |best, s| match best {
            None => Some(s),
            Some(b)
                if s.num_correct > b.num_correct
                    || (s.num_correct == b.num_correct && s.start_time < b.start_time) =>
            {
                Some(s)
            },
            Some(_) => best,
        })
    }

    /// Append a scored submission, marking the problem solved when every
    /// test case passed. Solved flags never transition back to false.
    pub fn record_submission(&mut self, submission: Submission) {
        if submission.is_correct()
            && let Some(flag) = self.solved.get_mut(submission.problem_index)
        {
            *flag = true;
        }
        self.submissions.push(submission);
    }

    pub fn solved_all(&self) -> bool {
        !self.solved.is_empty() && self.solved.iter().all(|s| *s)
    }

    /// Number of trailing consecutive fully-correct submissions.
    pub fn correct_streak(&self) -> usize {
        self.submissions
            .iter()
            .rev()
            .take_while(|s| s.is_correct())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(problem_index: usize, num_correct: u32, start_time: u64) -> Submission {
        Submission {
            player_code: PlayerCode::new("x", Language::Python),
            problem_index,
            results: Vec::new(),
            start_time,
            num_correct,
            num_test_cases: 3,
            runtime_millis: None,
            compilation_error: None,
        }
    }

    fn player(num_problems: usize) -> Player {
        Player::new(User::new("Alice"), num_problems, PlayerColor::default())
    }

    #[test]
    fn best_submission_prefers_higher_score() {
        let mut p = player(1);
        p.record_submission(submission(0, 1, 10));
        p.record_submission(submission(0, 2, 20));
        assert_eq!(p.best_submission().unwrap().num_correct, 2);
    }

    #[test]
    fn best_submission_tie_goes_to_earlier_start() {
        let mut p = player(1);
        // Appended out of start-time order, as happens when a slow tester
        // round-trip finishes after a faster later attempt.
        p.record_submission(submission(0, 2, 50));
        p.record_submission(submission(0, 2, 20));
        assert_eq!(p.best_submission().unwrap().start_time, 20);
    }

    #[test]
    fn best_submission_none_without_history() {
        assert!(player(1).best_submission().is_none());
    }

    #[test]
    fn record_marks_solved_only_on_full_pass() {
        let mut p = player(2);
        p.record_submission(submission(0, 2, 10));
        assert!(!p.solved[0]);
        p.record_submission(submission(0, 3, 20));
        assert!(p.solved[0]);
        assert!(!p.solved[1]);
        assert!(!p.solved_all());
        p.record_submission(submission(1, 3, 30));
        assert!(p.solved_all());
    }

    #[test]
    fn solved_flag_never_reverts() {
        let mut p = player(1);
        p.record_submission(submission(0, 3, 10));
        p.record_submission(submission(0, 0, 20));
        assert!(p.solved[0]);
    }

    #[test]
    fn history_is_append_only() {
        let mut p = player(1);
        let mut lengths = Vec::new();
        for i in 0..5 {
            p.record_submission(submission(0, i % 4, u64::from(i) * 10));
            lengths.push(p.submissions.len());
        }
        assert_eq!(lengths, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn correct_streak_counts_trailing_passes() {
        let mut p = player(1);
        p.record_submission(submission(0, 1, 10));
        p.record_submission(submission(0, 3, 20));
        p.record_submission(submission(0, 3, 30));
        assert_eq!(p.correct_streak(), 2);
        p.record_submission(submission(0, 0, 40));
        assert_eq!(p.correct_streak(), 0);
    }

    #[test]
    fn out_of_range_problem_index_does_not_panic() {
        let mut p = player(1);
        p.record_submission(submission(7, 3, 10));
        assert_eq!(p.submissions.len(), 1);
        assert!(!p.solved[0]);
    }
}

use serde::{Deserialize, Serialize};

use crate::player::PlayerCode;

/// Outcome of one test case within a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub console: String,
    pub user_output: String,
    pub error: String,
    pub correct_output: String,
    pub correct: bool,
    pub hidden: bool,
}

/// One scored attempt at one problem. Immutable once created; a
/// player's history only ever appends, which keeps best-submission
/// computation a pure fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub player_code: PlayerCode,
    pub problem_index: usize,
    pub results: Vec<SubmissionResult>,
    /// Epoch millis captured when the attempt was constructed.
    pub start_time: u64,
    pub num_correct: u32,
    pub num_test_cases: u32,
    pub runtime_millis: Option<f64>,
    pub compilation_error: Option<String>,
}

impl Submission {
    /// A submission solves its problem iff every test case passed.
    pub fn is_correct(&self) -> bool {
        self.num_test_cases > 0 && self.num_correct == self.num_test_cases
    }
}

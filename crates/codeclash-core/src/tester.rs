use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::problem::{Language, Problem};

/// Request sent to the external code-execution service: one request per
/// attempt, carrying the code and the full problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TesterRequest {
    pub code: String,
    pub language: Language,
    pub problem: Problem,
}

/// Per-test-case verdict returned by the tester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseResult {
    #[serde(default)]
    pub console: String,
    #[serde(default)]
    pub user_output: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub correct_output: String,
    pub correct: bool,
    #[serde(default)]
    pub hidden: bool,
}

/// Aggregate tester verdict. A compilation error short-circuits
/// per-case scoring: every case counts as failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TesterResponse {
    pub results: Vec<TestCaseResult>,
    pub num_correct: u32,
    pub num_test_cases: u32,
    #[serde(default)]
    pub runtime_millis: Option<f64>,
    #[serde(default)]
    pub compilation_error: Option<String>,
}

/// Transport or service failure from the tester. Fatal to the attempt,
/// surfaced to the requester, never retried automatically.
#[derive(Debug)]
pub enum TesterError {
    Transport(String),
    Service { status: u16, body: String },
}

impl std::fmt::Display for TesterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "tester transport error: {e}"),
            Self::Service { status, body } => {
                write!(f, "tester service error (status {status}): {body}")
            },
        }
    }
}

impl std::error::Error for TesterError {}

/// Object-safe boundary to the external tester service.
pub trait TesterClient: Send + Sync {
    fn evaluate(&self, request: TesterRequest)
    -> BoxFuture<'_, Result<TesterResponse, TesterError>>;
}

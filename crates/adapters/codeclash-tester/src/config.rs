use std::time::Duration;

/// Configuration for the code-execution service client.
#[derive(Debug, Clone)]
pub struct TesterHttpConfig {
    /// Base URL of the tester service, without a trailing path.
    pub base_url: String,
    /// Per-request timeout covering connect, send, and response body.
    pub timeout: Duration,
}

impl Default for TesterHttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

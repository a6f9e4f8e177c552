use futures::future::BoxFuture;

use codeclash_core::tester::{TesterClient, TesterError, TesterRequest, TesterResponse};

use crate::config::TesterHttpConfig;

/// HTTP adapter for the external code-execution service. One POST per
/// attempt; failures are fatal to the attempt and never retried here.
pub struct HttpTesterClient {
    config: TesterHttpConfig,
    client: reqwest::Client,
}

fn evaluate_url(base_url: &str) -> String {
    format!("{}/api/v1/evaluate", base_url.trim_end_matches('/'))
}

impl HttpTesterClient {
    pub fn new(config: TesterHttpConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("codeclash-tester/0.1")
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { config, client }
    }

    async fn evaluate_inner(&self, request: TesterRequest) -> Result<TesterResponse, TesterError> {
        let url = evaluate_url(&self.config.base_url);
        tracing::debug!(
            problem = %request.problem.name,
            language = ?request.language,
            "Sending submission to tester"
        );

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| TesterError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TesterError::Service {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<TesterResponse>()
            .await
            .map_err(|e| TesterError::Transport(e.to_string()))
    }
}

impl TesterClient for HttpTesterClient {
    fn evaluate(
        &self,
        request: TesterRequest,
    ) -> BoxFuture<'_, Result<TesterResponse, TesterError>> {
        Box::pin(self.evaluate_inner(request))
    }
}

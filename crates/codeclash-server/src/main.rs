use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use codeclash_server::config::ServerConfig;
use codeclash_server::report::spawn_report_logger;
use codeclash_server::state::AppState;
use codeclash_tester::{HttpTesterClient, TesterHttpConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("CodeClash engine starting");

    let config = ServerConfig::load();
    config.validate();

    let tester = Arc::new(HttpTesterClient::new(TesterHttpConfig {
        base_url: config.tester.base_url.clone(),
        timeout: Duration::from_secs(config.tester.timeout_secs),
    }));
    let (report_sink, _report_task) = spawn_report_logger();
    let state = AppState::new(config, tester, report_sink);

    tracing::info!(
        tester = %state.config.tester.base_url,
        "Engine ready, waiting for shutdown signal"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}

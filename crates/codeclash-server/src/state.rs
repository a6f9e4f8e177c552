use std::sync::Arc;
use tokio::sync::RwLock;

use codeclash_core::tester::TesterClient;

use crate::config::ServerConfig;
use crate::registry::{GameRegistry, SharedGameRegistry};
use crate::report::ReportSink;

#[derive(Clone)]
pub struct AppState {
    pub registry: SharedGameRegistry,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        tester: Arc<dyn TesterClient>,
        report_sink: ReportSink,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            registry: Arc::new(RwLock::new(GameRegistry::new(
                Arc::clone(&config),
                tester,
                report_sink,
            ))),
            config,
        }
    }
}

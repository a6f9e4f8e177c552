pub mod client;
pub mod config;

pub use client::HttpTesterClient;
pub use config::TesterHttpConfig;

pub mod broadcast;
pub mod config;
pub mod error;
pub mod registry;
pub mod report;
pub mod scorer;
pub mod session;
pub mod state;
pub mod timer;

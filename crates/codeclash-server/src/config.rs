use serde::Deserialize;

use codeclash_core::room::RoomSettings;

/// Top-level engine configuration, loaded from `codeclash.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub tester: TesterConfig,
    pub rooms: RoomsConfig,
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tester: TesterConfig::default(),
            rooms: RoomsConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// External code-execution service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TesterConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Room lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    /// Settings applied to newly created rooms until the host changes them.
    pub defaults: RoomSettings,
    /// Remaining-time marks (seconds before the deadline) at which a
    /// time-left notification is pushed to the room.
    pub time_warnings_secs: Vec<u64>,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            defaults: RoomSettings::default(),
            time_warnings_secs: vec![60, 30, 10],
        }
    }
}

/// Infrastructure limits (buffer sizes).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Bounded outbound buffer per room subscriber; slow subscribers
    /// drop messages rather than stall the session.
    pub subscriber_message_buffer: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            subscriber_message_buffer: 256,
        }
    }
}

impl ServerConfig {
    /// Validate configuration, exiting on fatal issues.
    pub fn validate(&self) {
        if self.tester.base_url.is_empty() {
            tracing::error!("tester.base_url must not be empty");
            std::process::exit(1);
        }
        if !self.tester.base_url.starts_with("http://")
            && !self.tester.base_url.starts_with("https://")
        {
            tracing::error!(
                url = %self.tester.base_url,
                "tester.base_url must be an http(s) URL"
            );
            std::process::exit(1);
        }
        if self.tester.timeout_secs == 0 {
            tracing::error!("tester.timeout_secs must be > 0");
            std::process::exit(1);
        }

        if let Err(e) = self.rooms.defaults.validate() {
            tracing::error!(error = %e, "rooms.defaults are not valid room settings");
            std::process::exit(1);
        }

        if self.limits.subscriber_message_buffer == 0 {
            tracing::error!("limits.subscriber_message_buffer must be > 0");
            std::process::exit(1);
        }
    }

    /// Load config from `codeclash.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("codeclash.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from codeclash.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse codeclash.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No codeclash.toml found, using defaults");
                ServerConfig::default()
            },
        };

        // Environment variable overrides
        if let Ok(url) = std::env::var("CODECLASH_TESTER_URL")
            && !url.is_empty()
        {
            config.tester.base_url = url;
        }
        if let Ok(val) = std::env::var("CODECLASH_TESTER_TIMEOUT_SECS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.tester.timeout_secs = n;
        }
        if let Ok(val) = std::env::var("CODECLASH_SUBSCRIBER_BUFFER")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.subscriber_message_buffer = n;
        }

        config
    }
}

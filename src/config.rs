//! Coordinator configuration parameters
//!
//! All tunable timing parameters for the feeder coordinator.
//! Values come from defaults, an optional JSON file, and the
//! `FEEDER_DEVICE_ID` environment variable, in that order.

use core::fmt;
use core::time::Duration;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Environment variable that overrides [`CoordinatorConfig::device_id`].
pub const DEVICE_ID_ENV: &str = "FEEDER_DEVICE_ID";

/// Core coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Device identifier; channel names are derived from it.
    pub device_id: String,

    // --- Liveness ---
    /// Expected interval between device heartbeats (milliseconds)
    pub heartbeat_interval_ms: u64,
    /// Silence after which the device is declared offline (milliseconds)
    pub offline_threshold_ms: u64,

    // --- Commands ---
    /// How long a manual feed waits for `feed_done` (milliseconds)
    pub feed_ack_timeout_ms: u64,

    // --- Timing ---
    /// Backing-store refresh period (milliseconds, 0 disables)
    pub store_refresh_interval_ms: u64,
    /// Driver tick period (milliseconds)
    pub tick_interval_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            device_id: "feeder01".to_string(),

            // Liveness
            heartbeat_interval_ms: 20_000,
            offline_threshold_ms: 60_000,

            // Commands
            feed_ack_timeout_ms: 12_000,

            // Timing
            store_refresh_interval_ms: 2_000,
            tick_interval_ms: 250,
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration: defaults, then `path` (if given), then env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .map_err(|e| ConfigError::Io(format!("{}: {e}", p.display())))?;
                Self::from_json(&text)?
            }
            None => Self::default(),
        };

        if let Ok(id) = std::env::var(DEVICE_ID_ENV) {
            if !id.trim().is_empty() {
                config.device_id = id.trim().to_string();
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document.  Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reject configurations that would make the liveness signal flap
    /// or the session unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_id.is_empty() {
            return Err(ConfigError::ValidationFailed("device_id must not be empty"));
        }
        if self.device_id.contains('/') {
            return Err(ConfigError::ValidationFailed("device_id must not contain '/'"));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("heartbeat_interval_ms must be > 0"));
        }
        if self.offline_threshold_ms < self.heartbeat_interval_ms.saturating_mul(2) {
            return Err(ConfigError::ValidationFailed(
                "offline_threshold_ms must be at least 2x heartbeat_interval_ms",
            ));
        }
        if self.feed_ack_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("feed_ack_timeout_ms must be > 0"));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("tick_interval_ms must be > 0"));
        }
        Ok(())
    }

    pub fn offline_threshold(&self) -> Duration {
        Duration::from_millis(self.offline_threshold_ms)
    }

    pub fn feed_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.feed_ack_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// `None` when periodic refresh is disabled.
    pub fn store_refresh_interval(&self) -> Option<Duration> {
        (self.store_refresh_interval_ms > 0)
            .then(|| Duration::from_millis(self.store_refresh_interval_ms))
    }
}

// ───────────────────────────────────────────────────────────────
// Error type
// ───────────────────────────────────────────────────────────────

/// Errors from loading or validating configuration values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// The config document could not be parsed.
    Parse(String),
    /// The config file could not be read.
    Io(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::Parse(msg) => write!(f, "parse error: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

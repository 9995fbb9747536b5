//! Engine tuning and base-URL handling
//!
//! Every wait in the engine is bounded by a value from [`EngineConfig`]. The defaults are
//! the production values; tests shrink nothing and instead run on a paused tokio clock.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Readiness handshake settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Maximum number of pings after injection
    pub ping_retries: u32,
    /// Pause between injecting the runtime and the first ping
    pub inject_settle_ms: u64,
    /// Backoff before the first retry
    pub backoff_base_ms: u64,
    /// Linear backoff increment per attempt
    pub backoff_step_ms: u64,
    /// Upper bound for a single backoff delay
    pub backoff_cap_ms: u64,
    /// How long one ping may go unanswered before it counts as failed
    pub ping_timeout_ms: u64,
}

impl ReadinessConfig {
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            ping_retries: 25,
            inject_settle_ms: 500,
            backoff_base_ms: 300,
            backoff_step_ms: 100,
            backoff_cap_ms: 1000,
            ping_timeout_ms: 2000,
        }
    }
}

/// Upload executor settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    /// Timeout for a single image download
    pub fetch_timeout_secs: u64,
    /// Images per batch in multi-step uploads
    pub batch_size: usize,
    /// Maximum number of batches in multi-step uploads
    pub max_steps: usize,
    /// Pause after clicking an upload trigger
    pub trigger_settle_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 15,
            batch_size: 5,
            max_steps: 10,
            trigger_settle_ms: 800,
        }
    }
}

impl UploadConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn trigger_settle(&self) -> Duration {
        Duration::from_millis(self.trigger_settle_ms)
    }
}

/// Full engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub readiness: ReadinessConfig,
    pub upload: UploadConfig,
    /// Pause after each field write so re-rendering pages settle
    pub field_delay_ms: u64,
}

impl EngineConfig {
    /// Load configuration from a JSON file; missing keys fall back to defaults
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    pub fn field_delay(&self) -> Duration {
        Duration::from_millis(self.field_delay_ms)
    }

    /// Adapter-level defaults with the production field delay
    pub fn production() -> Self {
        Self {
            field_delay_ms: 150,
            ..Default::default()
        }
    }
}

/// Normalize a user-entered CRM base URL.
///
/// Adds a missing scheme (`http` for local hosts, `https` otherwise) and strips trailing
/// slashes so endpoint paths can be appended directly. Empty input stays empty.
pub fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else if trimmed.starts_with("localhost") || trimmed.starts_with("127.0.0.1") {
        format!("http://{}", trimmed)
    } else {
        format!("https://{}", trimmed)
    };

    with_scheme.trim_end_matches('/').to_string()
}

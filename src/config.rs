//! Connection settings.
//!
//! Everything has a working default, so a missing or broken config file only
//! costs a warning. Hosts give plugins no configuration surface, so overrides
//! come from the environment.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::wavelink::dispatch::SequentialIds;
use crate::wavelink::ClientError;

/// Wave Link listens on this port on the local machine.
pub const DEFAULT_URL: &str = "ws://localhost:1824";

/// Path of an optional JSON config file.
pub const CONFIG_PATH_ENV: &str = "WAVELINK_SYNC_CONFIG";
/// Overrides `url` from the config file.
pub const URL_ENV: &str = "WAVELINK_SYNC_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_ms: 1_000,
            max_delay_ms: 10_000,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based): doubles from
    /// `initial_delay_ms` up to `max_delay_ms`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .initial_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub url: String,
    pub connect_timeout_ms: u64,
    /// First correlation id handed out for queries.
    pub first_request_id: i64,
    pub reconnect: ReconnectPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            connect_timeout_ms: 5_000,
            first_request_id: SequentialIds::DEFAULT_FIRST_ID,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl SyncConfig {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(text).context("invalid sync config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Loads settings from `WAVELINK_SYNC_CONFIG` and `WAVELINK_SYNC_URL`.
    /// Falls back to defaults on any error.
    pub fn from_env() -> Self {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(Path::new(&path)).unwrap_or_else(|err| {
                log::warn!("{:#}; using default Wave Link settings", err);
                Self::default()
            }),
            None => Self::default(),
        };

        if let Ok(url) = std::env::var(URL_ENV) {
            let candidate = Self {
                url,
                ..config.clone()
            };
            match candidate.validate() {
                Ok(()) => config = candidate,
                Err(err) => log::warn!("ignoring {}: {}", URL_ENV, err),
            }
        }

        config
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let url = url::Url::parse(&self.url)?;
        // Wave Link only serves plain websockets on the loopback interface
        match url.scheme() {
            "ws" => Ok(()),
            other => Err(ClientError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.url, "ws://localhost:1824");
        assert!(config.reconnect.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SyncConfig::from_json(
            r#"{"url": "ws://10.0.0.5:1824", "reconnect": {"max_delay_ms": 3000}}"#,
        )
        .unwrap();
        assert_eq!(config.url, "ws://10.0.0.5:1824");
        assert_eq!(config.connect_timeout_ms, 5_000);
        assert_eq!(config.reconnect.max_delay_ms, 3_000);
        assert_eq!(config.reconnect.initial_delay_ms, 1_000);
        assert!(config.reconnect.enabled);
    }

    #[test]
    fn test_rejects_non_websocket_url() {
        assert!(SyncConfig::from_json(r#"{"url": "http://localhost:1824"}"#).is_err());
        assert!(SyncConfig::from_json(r#"{"url": "wss://localhost:1824"}"#).is_err());
        assert!(SyncConfig::from_json(r#"{"url": "not a url"}"#).is_err());
        assert!(SyncConfig::from_json("{").is_err());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4_000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(8_000));
        assert_eq!(policy.delay_for(5), Duration::from_millis(10_000));
        assert_eq!(policy.delay_for(500), Duration::from_millis(10_000));
        // attempt 0 behaves like the first attempt
        assert_eq!(policy.delay_for(0), Duration::from_millis(1_000));
    }
}

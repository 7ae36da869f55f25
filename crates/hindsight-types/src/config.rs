//! Startup configuration types for Hindsight.
//!
//! `HindsightConfig` represents the `hindsight.toml` file. Every field has a
//! default so an empty or missing file still yields a usable configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HindsightConfig {
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Retrieval limits and the set of public conversations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum number of recent lines returned for a conversation.
    #[serde(default = "default_window_limit")]
    pub window_limit: usize,

    /// Maximum length of a reconstructed reply chain (including the current line).
    #[serde(default = "default_chain_limit")]
    pub chain_limit: usize,

    /// Conversation ids provisioned with one shared queue for all agents.
    #[serde(default)]
    pub shared_conversations: Vec<i64>,
}

fn default_window_limit() -> usize {
    32
}

fn default_chain_limit() -> usize {
    16
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            window_limit: default_window_limit(),
            chain_limit: default_chain_limit(),
            shared_conversations: Vec::new(),
        }
    }
}

/// Eviction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Maximum age of a line or reply link before it is evicted.
    #[serde(default = "default_message_ttl_secs")]
    pub message_ttl_secs: u64,

    /// Time between sweeps. The first sweep runs at startup.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_message_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_sweep_interval_secs() -> u64 {
    60 * 60
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            message_ttl_secs: default_message_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl SweeperConfig {
    pub fn message_ttl(&self) -> Duration {
        Duration::from_secs(self.message_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Snapshot file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,

    /// Pending save notifications kept before further ones are coalesced.
    #[serde(default = "default_notify_capacity")]
    pub notify_capacity: usize,
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("history.bin")
}

fn default_notify_capacity() -> usize {
    1
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
            notify_capacity: default_notify_capacity(),
        }
    }
}

/// Logging output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info,hindsight_core=debug").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,

    /// Bridge spans to OpenTelemetry (stdout exporter).
    #[serde(default)]
    pub otel: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            otel: false,
        }
    }
}

impl HindsightConfig {
    /// Reject values the store cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory.window_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "memory.window_limit",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.memory.chain_limit < 2 {
            return Err(ConfigError::Invalid {
                field: "memory.chain_limit",
                reason: "must be at least 2".to_string(),
            });
        }
        if self.sweeper.message_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "sweeper.message_ttl_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.sweeper.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "sweeper.sweep_interval_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.snapshot.notify_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "snapshot.notify_capacity",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = HindsightConfig::default();
        assert_eq!(config.memory.window_limit, 32);
        assert_eq!(config.memory.chain_limit, 16);
        assert!(config.memory.shared_conversations.is_empty());
        assert_eq!(config.sweeper.message_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.sweeper.sweep_interval(), Duration::from_secs(3_600));
        assert_eq!(config.snapshot.path, PathBuf::from("history.bin"));
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialize_empty_uses_defaults() {
        let config: HindsightConfig = toml::from_str("").unwrap();
        assert_eq!(config.memory.window_limit, 32);
        assert_eq!(config.sweeper.message_ttl_secs, 86_400);
        assert_eq!(config.snapshot.notify_capacity, 1);
    }

    #[test]
    fn test_config_deserialize_with_values() {
        let toml_str = r#"
[memory]
window_limit = 8
chain_limit = 4
shared_conversations = [-1001, -1002]

[sweeper]
message_ttl_secs = 3600
sweep_interval_secs = 60

[snapshot]
path = "/var/lib/hindsight/history.bin"

[logging]
level = "debug"
json = true
"#;
        let config: HindsightConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.memory.window_limit, 8);
        assert_eq!(config.memory.chain_limit, 4);
        assert_eq!(config.memory.shared_conversations, vec![-1001, -1002]);
        assert_eq!(config.sweeper.message_ttl(), Duration::from_secs(3_600));
        assert_eq!(config.sweeper.sweep_interval(), Duration::from_secs(60));
        assert_eq!(
            config.snapshot.path,
            PathBuf::from("/var/lib/hindsight/history.bin")
        );
        assert!(config.logging.json);
        assert!(!config.logging.otel);
    }

    #[test]
    fn test_validate_rejects_short_chain_limit() {
        let mut config = HindsightConfig::default();
        config.memory.chain_limit = 1;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "memory.chain_limit",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_rejects_zero_ttl_and_interval() {
        let mut config = HindsightConfig::default();
        config.sweeper.message_ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = HindsightConfig::default();
        config.sweeper.sweep_interval_secs = 0;
        assert!(config.validate().is_err());
    }
}

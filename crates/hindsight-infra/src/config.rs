//! Startup configuration loader for Hindsight.
//!
//! Reads a TOML file into [`HindsightConfig`]. Falls back to defaults when the
//! file is missing or malformed, then validates the result. Validation is the
//! only fatal configuration failure besides an unreadable file.
//!
//! The loader runs before the tracing subscriber exists, so instead of
//! logging it reports where the configuration came from in [`ConfigSource`].

use std::path::{Path, PathBuf};

use hindsight_types::config::HindsightConfig;
use hindsight_types::error::ConfigError;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "hindsight.toml";

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// No file at the path; defaults in effect.
    Missing(PathBuf),
    /// The file did not parse; defaults in effect.
    Malformed { path: PathBuf, reason: String },
}

impl ConfigSource {
    /// Emit the log line describing this source.
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => {
                tracing::debug!("Loaded config from {}", path.display());
            }
            ConfigSource::Missing(path) => {
                tracing::debug!("No config found at {}, using defaults", path.display());
            }
            ConfigSource::Malformed { path, reason } => {
                tracing::warn!("Failed to parse {}: {reason}, using defaults", path.display());
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: HindsightConfig,
    pub source: ConfigSource,
}

/// Parse TOML text into a configuration, without validating it.
pub fn parse_config(content: &str) -> Result<HindsightConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Load and validate the configuration at `path`.
///
/// - If the file does not exist, the defaults are used.
/// - If the file exists but cannot be read, returns [`ConfigError::Read`].
/// - If the file fails to parse, the defaults are used.
/// - Out-of-range values return [`ConfigError::Invalid`].
pub async fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let (config, source) = match tokio::fs::read_to_string(path).await {
        Ok(content) => match parse_config(&content) {
            Ok(config) => (config, ConfigSource::File(path.to_path_buf())),
            Err(err) => (
                HindsightConfig::default(),
                ConfigSource::Malformed {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                },
            ),
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => (
            HindsightConfig::default(),
            ConfigSource::Missing(path.to_path_buf()),
        ),
        Err(err) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                reason: err.to_string(),
            });
        }
    };

    config.validate()?;
    Ok(LoadedConfig { config, source })
}

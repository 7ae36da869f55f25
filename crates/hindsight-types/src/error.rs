use thiserror::Error;

/// Errors from reading or writing a persisted snapshot.
///
/// None of these are fatal to a running process: load failures fall back to
/// an empty store and save failures are retried on the next trigger.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode snapshot: {0}")]
    Encode(String),

    #[error("failed to decode snapshot: {0}")]
    Decode(String),

    #[error("unrecognized snapshot format: {0}")]
    Format(String),
}

/// Errors from loading startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_io_error_display() {
        let err = SnapshotError::Io {
            path: "/tmp/history.bin".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/history.bin"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_config_invalid_display() {
        let err = ConfigError::Invalid {
            field: "memory.chain_limit",
            reason: "must be at least 2".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value for 'memory.chain_limit': must be at least 2"
        );
    }
}

//! Error types for CLI operations.

use contracts::ContractError;
use context::ContextError;
use proxy::ProxyError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse / validation error
    #[error("Invalid configuration: {0}")]
    Config(#[from] ContractError),

    /// Connection, actor or sync failure
    #[error(transparent)]
    Context(#[from] ContextError),

    /// Proxy startup / shutdown failure
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    /// Blocking worker failed to complete
    #[error("Worker task failed: {message}")]
    Worker { message: String },

    /// Generic error wrapper
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn worker(message: impl Into<String>) -> Self {
        Self::Worker {
            message: message.into(),
        }
    }

    /// Process exit code: 2 connection, 3 timeout, 4 configuration, 1 anything else
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::ConfigNotFound { .. } | CliError::Config(_) => 4,
            CliError::Context(e) if e.is_connection() => 2,
            CliError::Context(e) if e.is_timeout() => 3,
            CliError::Proxy(ProxyError::Timeout { .. }) => 3,
            _ => 1,
        }
    }
}

impl From<sync_engine::SyncError> for CliError {
    fn from(e: sync_engine::SyncError) -> Self {
        CliError::Context(ContextError::from(e))
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::config_not_found("x.toml").exit_code(), 4);
        assert_eq!(
            CliError::from(ContractError::config_validation("sync", "bad")).exit_code(),
            4
        );
        assert_eq!(
            CliError::from(ContextError::connection("127.0.0.1", 2000, "refused")).exit_code(),
            2
        );
        assert_eq!(CliError::from(ContextError::timeout("ticks")).exit_code(), 3);
        assert_eq!(
            CliError::from(ProxyError::Timeout {
                name: "imu".into(),
                timeout_ms: 2000
            })
            .exit_code(),
            3
        );
        assert_eq!(CliError::worker("panicked").exit_code(), 1);
    }

    #[test]
    fn test_sync_timeout_maps_to_timeout_exit() {
        let e = CliError::from(sync_engine::SyncError::Timeout {
            observed: 1,
            requested: 5,
        });
        assert_eq!(e.exit_code(), 3);
    }
}

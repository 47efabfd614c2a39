//! Error types for chair

use thiserror::Error;

/// Main error type for chair
#[derive(Debug, Error)]
pub enum ChairError {
    /// SSH connection failed (network, handshake, timeout, channel open)
    #[error("SSH connection error: {0}")]
    Connection(String),

    /// SSH authentication failed (password or key)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The remote side refused to start the requested command
    #[error("Remote refused to execute command: {0}")]
    ExecutionRejected(String),

    /// Secret could not be collected from the operator
    #[error("Prompt relay failed: {0}")]
    PromptRelay(String),

    /// Operation needs a live connection but none was established
    #[error("Session is not connected")]
    NotConnected,

    /// Operator interrupted the run
    #[error("Interrupted by operator")]
    Interrupted,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SSH key loading error
    #[error("SSH key error: {0}")]
    SshKey(String),
}

/// Result type alias using ChairError
pub type Result<T> = std::result::Result<T, ChairError>;

impl ChairError {
    /// Create a connection error from a string
    pub fn connection(msg: impl Into<String>) -> Self {
        ChairError::Connection(msg.into())
    }

    /// Create an authentication error from a string
    pub fn auth(msg: impl Into<String>) -> Self {
        ChairError::Authentication(msg.into())
    }

    /// Create an execution rejected error from a string
    pub fn rejected(msg: impl Into<String>) -> Self {
        ChairError::ExecutionRejected(msg.into())
    }

    /// Create a prompt relay error from a string
    pub fn prompt_relay(msg: impl Into<String>) -> Self {
        ChairError::PromptRelay(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        ChairError::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChairError::Connection("failed to connect".to_string());
        assert_eq!(err.to_string(), "SSH connection error: failed to connect");

        let err = ChairError::rejected("sh -c 'ls'");
        assert_eq!(
            err.to_string(),
            "Remote refused to execute command: sh -c 'ls'"
        );

        assert_eq!(
            ChairError::NotConnected.to_string(),
            "Session is not connected"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ChairError = io.into();
        assert!(matches!(err, ChairError::Io(_)));
    }
}

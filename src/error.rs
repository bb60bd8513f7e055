//! Error types for the ledger node

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The chain has no blocks. Genesis is created on construction, so this
    /// only shows up when a ledger was assembled by hand.
    #[error("Chain is empty")]
    EmptyChain,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Peer {address} unreachable: {reason}")]
    PeerUnreachable { address: String, reason: String },
    #[error("Invalid chain: {0}")]
    InvalidChain(String),
    #[error("Mining error: {0}")]
    Mining(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_unreachable_names_the_peer() {
        let err = ChainError::PeerUnreachable {
            address: "http://10.0.0.7:5000".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Peer http://10.0.0.7:5000 unreachable: connection refused"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "config.toml");
        let err: ChainError = io.into();
        assert!(matches!(err, ChainError::Io(msg) if msg.contains("config.toml")));
    }
}

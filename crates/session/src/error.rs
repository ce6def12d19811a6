//! Error types for session token operations

/// Errors from minting or validating session tokens.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad signature, malformed structure, or expired.
    #[error("invalid session token: {0}")]
    InvalidToken(String),

    #[error("session token signing failed: {0}")]
    Signing(String),

    #[error("invalid session configuration: {0}")]
    Config(String),
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

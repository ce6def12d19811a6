//! Error types for Google OAuth and credential storage operations

/// Errors from provider calls and credential persistence.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network failure or non-success status from Google.
    #[error("provider request failed: {0}")]
    Provider(String),

    /// Google answered with a body that does not decode into the expected shape.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

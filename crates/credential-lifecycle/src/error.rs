//! Error types for lifecycle operations

/// Errors surfaced by `CredentialManager`. None of them are retried here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("credential not found: {0}")]
    NotFound(String),

    /// The subject cannot be renewed silently and has to sign in again.
    #[error("no refresh token: {0}")]
    MissingRefreshToken(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("session token error: {0}")]
    Session(String),
}

/// Result alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<google_auth::Error> for Error {
    fn from(e: google_auth::Error) -> Self {
        match e {
            google_auth::Error::Provider(msg) | google_auth::Error::Config(msg) => {
                Error::Provider(msg)
            }
            google_auth::Error::MalformedResponse(msg) => Error::MalformedResponse(msg),
            google_auth::Error::NotFound(msg) => Error::NotFound(msg),
            google_auth::Error::Persistence(msg) => Error::Persistence(msg),
        }
    }
}

impl From<session::Error> for Error {
    fn from(e: session::Error) -> Self {
        Error::Session(e.to_string())
    }
}

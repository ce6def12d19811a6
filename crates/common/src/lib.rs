//! Shared types for the Google sign-in gateway workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::{Secret, resolve_secret};

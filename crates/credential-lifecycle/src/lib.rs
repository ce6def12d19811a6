//! Credential lifecycle for signed-in users
//!
//! Orchestrates the Google client, the credential store and the session
//! issuer. Two entry points:
//!
//! Login path (`CredentialManager::complete_login`):
//! 1. Exchange the authorization code for a `TokenSet`
//! 2. Fetch the profile to learn the subject id
//! 3. Merge with any stored refresh token and upsert the credential
//! 4. Mint a session token
//!
//! Steady-state path (`CredentialManager::ensure_access_token`):
//! 1. Look up the subject's credential
//! 2. Valid → return the stored access token without I/O
//! 3. Expired → refresh, keep the old refresh token unless Google rotated it,
//!    upsert, return the new access token
//!
//! Per subject, the read-check-refresh-write sequence runs under an async
//! mutex so concurrent callers share one refresh.

pub mod clock;
pub mod error;
pub mod manager;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use manager::{CredentialManager, LoginOutcome};

//! Google OAuth client and credential storage
//!
//! Provides authorization URL construction, token exchange/refresh, profile
//! lookup, and keyed credential persistence for the sign-in gateway. This
//! crate holds no per-user state of its own; the lifecycle manager decides
//! when each call happens.
//!
//! Credential flow:
//! 1. Gateway calls `authorize::generate_state()` and redirects the browser
//!    to `GoogleClient::authorization_url()`
//! 2. Google redirects back with an authorization code
//! 3. `GoogleClient::exchange_code()` turns the code into a `TokenSet`
//! 4. `GoogleClient::fetch_profile()` identifies the subject
//! 5. The credential is persisted via `CredentialStore::upsert()`
//! 6. Expired access tokens are renewed with `GoogleClient::refresh_access_token()`

pub mod authorize;
pub mod client;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod profile;
pub mod token;

pub use authorize::generate_state;
pub use client::{BoxFuture, ClientConfig, GoogleClient, IdentityProvider};
pub use constants::*;
pub use credentials::{
    Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore, now_millis,
};
pub use error::{Error, Result};
pub use profile::Profile;
pub use token::TokenSet;

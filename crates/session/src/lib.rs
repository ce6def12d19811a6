//! Stateless session tokens for the sign-in gateway
//!
//! After a successful login the gateway hands the frontend an HS256 JWT
//! carrying the subject id, email and admin flag. Every protected request
//! presents it back; `SessionIssuer::validate` is the only authorization gate.
//! Nothing is stored server-side, so a token lives exactly as long as its
//! `exp` claim.

pub mod error;
pub mod issuer;

pub use error::{Error, Result};
pub use issuer::{SessionClaims, SessionIssuer};

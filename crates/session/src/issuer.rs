//! Session token minting and validation

use std::time::Duration;

use common::Secret;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Claims embedded in a session token.
///
/// Timestamps are unix seconds, as JWT registered claims require.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(rename = "sub")]
    pub subject_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(rename = "iat")]
    pub issued_at: u64,
    #[serde(rename = "exp")]
    pub expires_at: u64,
}

/// Mints and validates HS256 session tokens with a single signing secret.
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl SessionIssuer {
    /// Build an issuer from the process-wide signing secret.
    pub fn new(secret: &Secret<String>) -> Result<Self> {
        let bytes = secret.expose().as_bytes();
        if bytes.is_empty() {
            return Err(Error::Config("signing secret must not be empty".into()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub", "iat"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            validation,
        })
    }

    /// Mint a token for `subject_id` expiring `ttl` from now.
    pub fn mint(
        &self,
        subject_id: &str,
        email: &str,
        is_admin: bool,
        ttl: Duration,
    ) -> Result<String> {
        self.mint_at(subject_id, email, is_admin, ttl, now_secs())
    }

    fn mint_at(
        &self,
        subject_id: &str,
        email: &str,
        is_admin: bool,
        ttl: Duration,
        issued_at: u64,
    ) -> Result<String> {
        let claims = SessionClaims {
            subject_id: subject_id.to_owned(),
            email: email.to_owned(),
            is_admin,
            issued_at,
            expires_at: issued_at.saturating_add(ttl.as_secs()),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| Error::Signing(e.to_string()))?;
        debug!(subject_id, expires_at = claims.expires_at, "session token minted");
        Ok(token)
    }

    /// Verify signature, structure and expiry, returning the embedded claims.
    pub fn validate(&self, token: &str) -> Result<SessionClaims> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| Error::InvalidToken(e.to_string()))?;
        Ok(data.claims)
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

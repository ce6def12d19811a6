//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (login callback)
//! 2. Refresh token grant (expired access token)
//!
//! Both operations POST a form to the token endpoint with different grant
//! types and decode the same JSON shape. Neither is retried here.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{GoogleClient, decode_response, send_error};
use crate::error::{Error, Result};

/// Response from the token endpoint for both exchange and refresh.
///
/// `expires_in` is a delta in seconds from the response time. The caller
/// converts it to an absolute timestamp once, when building the credential.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenSet {
    pub access_token: String,
    /// Absent or empty when Google does not rotate the refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
}

fn default_token_type() -> String {
    "Bearer".into()
}

impl TokenSet {
    /// The refresh token carried by this response, if it is non-empty.
    pub fn issued_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Absolute expiry in unix milliseconds for a response received at `issued_at_millis`.
    pub fn expires_at(&self, issued_at_millis: u64) -> u64 {
        issued_at_millis.saturating_add(self.expires_in.saturating_mul(1000))
    }

    fn validated(self, context: &str) -> Result<Self> {
        if self.access_token.is_empty() {
            return Err(Error::MalformedResponse(format!(
                "{context}: empty access_token"
            )));
        }
        Ok(self)
    }
}

impl GoogleClient {
    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet> {
        let config = self.config();
        let response = self
            .http()
            .post(&config.token_endpoint)
            .timeout(config.timeout)
            .form(&[
                ("code", code),
                ("client_id", config.client_id.as_str()),
                ("client_secret", config.client_secret.expose().as_str()),
                ("redirect_uri", config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| send_error("token exchange", e))?;

        let token: TokenSet = decode_response(response, "token exchange").await?;
        debug!(
            expires_in = token.expires_in,
            has_refresh_token = token.issued_refresh_token().is_some(),
            "authorization code exchanged"
        );
        token.validated("token exchange")
    }

    /// Obtain a new access token with a refresh token.
    ///
    /// The returned `refresh_token` may be missing when Google keeps the
    /// existing one; that is not an error.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenSet> {
        let config = self.config();
        let response = self
            .http()
            .post(&config.token_endpoint)
            .timeout(config.timeout)
            .form(&[
                ("client_id", config.client_id.as_str()),
                ("client_secret", config.client_secret.expose().as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| send_error("token refresh", e))?;

        let token: TokenSet = decode_response(response, "token refresh").await?;
        debug!(
            expires_in = token.expires_in,
            rotated = token.issued_refresh_token().is_some(),
            "access token refreshed"
        );
        token.validated("token refresh")
    }
}

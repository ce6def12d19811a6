//! Google client configuration and the `IdentityProvider` abstraction
//!
//! `GoogleClient` performs the three outbound calls and builds the
//! authorization URL. The lifecycle manager talks to it through the
//! `IdentityProvider` trait so tests can substitute a scripted provider.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use common::Secret;
use reqwest::Url;
use serde::de::DeserializeOwned;

use crate::authorize::build_authorization_url;
use crate::constants::{AUTHORIZE_ENDPOINT, TOKEN_ENDPOINT, USERINFO_ENDPOINT};
use crate::error::{Error, Result};
use crate::profile::Profile;
use crate::token::TokenSet;

/// Boxed future returned by `IdentityProvider` methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Identity provider operations consumed by the lifecycle manager.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn IdentityProvider>`).
pub trait IdentityProvider: Send + Sync {
    /// Authorization URL for a login attempt carrying `state`. No I/O.
    fn authorization_url(&self, state: &str) -> String;

    fn exchange_code<'a>(&'a self, code: &'a str) -> BoxFuture<'a, Result<TokenSet>>;

    fn refresh_access_token<'a>(&'a self, refresh_token: &'a str)
    -> BoxFuture<'a, Result<TokenSet>>;

    fn fetch_profile<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, Result<Profile>>;
}

/// Static client settings. Endpoints default to Google's public ones and are
/// only overridden in tests or when pointing at a compatible provider.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// Absolute callback URL registered with Google.
    pub redirect_uri: String,
    pub auth_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    /// Upper bound for each outbound request.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: Secret<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
            auth_endpoint: AUTHORIZE_ENDPOINT.into(),
            token_endpoint: TOKEN_ENDPOINT.into(),
            userinfo_endpoint: USERINFO_ENDPOINT.into(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Stateless Google OAuth client.
pub struct GoogleClient {
    http: reqwest::Client,
    config: ClientConfig,
    auth_endpoint: Url,
}

impl GoogleClient {
    /// Create a client, validating the configured endpoints up front so URL
    /// construction later cannot fail.
    pub fn new(http: reqwest::Client, config: ClientConfig) -> Result<Self> {
        if config.client_id.is_empty() {
            return Err(Error::Config("client_id must not be empty".into()));
        }
        let auth_endpoint = Url::parse(&config.auth_endpoint)
            .map_err(|e| Error::Config(format!("auth_endpoint {}: {e}", config.auth_endpoint)))?;
        for (name, value) in [
            ("token_endpoint", &config.token_endpoint),
            ("userinfo_endpoint", &config.userinfo_endpoint),
            ("redirect_uri", &config.redirect_uri),
        ] {
            Url::parse(value).map_err(|e| Error::Config(format!("{name} {value}: {e}")))?;
        }

        Ok(Self {
            http,
            config,
            auth_endpoint,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn authorization_url(&self, state: &str) -> String {
        build_authorization_url(
            &self.auth_endpoint,
            &self.config.client_id,
            &self.config.redirect_uri,
            state,
        )
    }
}

impl IdentityProvider for GoogleClient {
    fn authorization_url(&self, state: &str) -> String {
        GoogleClient::authorization_url(self, state)
    }

    fn exchange_code<'a>(&'a self, code: &'a str) -> BoxFuture<'a, Result<TokenSet>> {
        Box::pin(GoogleClient::exchange_code(self, code))
    }

    fn refresh_access_token<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<TokenSet>> {
        Box::pin(GoogleClient::refresh_access_token(self, refresh_token))
    }

    fn fetch_profile<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, Result<Profile>> {
        Box::pin(GoogleClient::fetch_profile(self, access_token))
    }
}

/// Map a transport failure into a provider error.
pub(crate) fn send_error(context: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Provider(format!("{context} timed out: {e}"))
    } else {
        Error::Provider(format!("{context} request failed: {e}"))
    }
}

/// Check the status and decode a JSON body.
///
/// Non-success statuses and body read failures are provider errors; a body
/// that arrives intact but does not decode is a malformed response.
pub(crate) async fn decode_response<T: DeserializeOwned>(
    response: reqwest::Response,
    context: &str,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Provider(format!(
            "{context} returned {status}: {body}"
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| Error::Provider(format!("{context} body read failed: {e}")))?;

    serde_json::from_str(&body)
        .map_err(|e| Error::MalformedResponse(format!("{context}: {e}")))
}

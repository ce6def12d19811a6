//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The Google client secret and the session signing secret are loaded from
//! env vars or secret files, never stored in the TOML directly.

use common::{Secret, resolve_secret};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Env var holding the Google OAuth client secret
pub const CLIENT_SECRET_ENV: &str = "GOOGLE_CLIENT_SECRET";

/// Env var holding the session signing secret
pub const SESSION_SECRET_ENV: &str = "SESSION_SECRET";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub google: GoogleConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// HTTP listener and redirect settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Externally reachable base URL; the OAuth callback hangs off it.
    pub public_url: String,
    /// Where the browser lands after a successful login.
    pub frontend_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
    /// Mark cookies `Secure`. Enable whenever `public_url` is https.
    #[serde(default)]
    pub secure_cookies: bool,
}

/// Google OAuth client settings
#[derive(Debug, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to GOOGLE_CLIENT_SECRET)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(default)]
    pub auth_endpoint: Option<String>,
    #[serde(default)]
    pub token_endpoint: Option<String>,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
}

/// Session token settings
#[derive(Debug, Default, Deserialize)]
pub struct SessionConfig {
    #[serde(skip)]
    pub secret: Option<Secret<String>>,
    /// Path to a file containing the signing secret (alternative to SESSION_SECRET)
    #[serde(default)]
    pub secret_file: Option<PathBuf>,
}

/// Credential store backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    1000
}

fn default_session_ttl() -> u64 {
    3600
}

impl Config {
    /// Load configuration from a TOML file, then overlay secrets from the
    /// environment.
    ///
    /// Secret resolution order (for both secrets):
    /// 1. env var
    /// 2. `*_file` path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        for (name, url) in [
            ("public_url", &config.server.public_url),
            ("frontend_url", &config.server.frontend_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }

        for (name, value) in [
            ("request_timeout_secs", config.server.request_timeout_secs),
            ("session_ttl_secs", config.server.session_ttl_secs),
            ("max_connections", config.server.max_connections as u64),
        ] {
            if value == 0 {
                return Err(common::Error::Config(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        if config.google.client_id.trim().is_empty() {
            return Err(common::Error::Config(
                "google.client_id must not be empty".into(),
            ));
        }

        if config.store.backend == StoreBackend::File && config.store.path.is_none() {
            return Err(common::Error::Config(
                "store.path is required when store.backend = \"file\"".into(),
            ));
        }

        config.google.client_secret = resolve_secret(
            CLIENT_SECRET_ENV,
            config.google.client_secret_file.as_deref(),
        )?;
        if config.google.client_secret.is_none() {
            return Err(common::Error::Config(format!(
                "google client secret missing: set {CLIENT_SECRET_ENV} or google.client_secret_file"
            )));
        }

        config.session.secret =
            resolve_secret(SESSION_SECRET_ENV, config.session.secret_file.as_deref())?;
        if config.session.secret.is_none() {
            return Err(common::Error::Config(format!(
                "session secret missing: set {SESSION_SECRET_ENV} or session.secret_file"
            )));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("auth-gateway.toml")
    }

    /// Absolute OAuth callback URL registered with Google.
    pub fn redirect_uri(&self) -> String {
        format!(
            "{}{}",
            self.server.public_url.trim_end_matches('/'),
            google_auth::CALLBACK_PATH
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.server.session_ttl_secs)
    }
}

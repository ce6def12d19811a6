//! Authorization URL construction
//!
//! The browser is sent to Google's authorization endpoint with the client
//! identity, the callback URL, and the flags that make Google return a
//! refresh token and show the account chooser. The `state` value is generated
//! per login attempt and checked again on the callback.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use reqwest::Url;

use crate::constants::{ACCESS_TYPE, PROMPT, SCOPES};

/// Generate a random opaque `state` value for CSRF protection.
///
/// 32 random bytes encoded as URL-safe base64 without padding (43 chars).
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Build the full authorization URL.
///
/// Pure function of its inputs: no I/O, same output for the same arguments.
pub fn build_authorization_url(
    endpoint: &Url,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
) -> String {
    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", SCOPES)
        .append_pair("state", state)
        .append_pair("access_type", ACCESS_TYPE)
        .append_pair("prompt", PROMPT);
    url.into()
}

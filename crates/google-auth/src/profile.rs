//! User profile lookup

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::client::{GoogleClient, decode_response, send_error};
use crate::error::{Error, Result};

/// Profile returned by the userinfo endpoint.
///
/// Only `id` is required. Every other field Google may or may not send
/// defaults to `None`; unknown fields are kept in `extra` so they survive a
/// round trip to the frontend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Stable subject identifier (`id` in v2 userinfo, `sub` in OIDC).
    #[serde(alias = "sub")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_email: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Profile {
    pub fn name_or_default(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub fn picture_or_default(&self) -> &str {
        self.picture.as_deref().unwrap_or_default()
    }
}

impl GoogleClient {
    /// Fetch the profile of the user owning `access_token`.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<Profile> {
        let config = self.config();
        let response = self
            .http()
            .get(&config.userinfo_endpoint)
            .timeout(config.timeout)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| send_error("profile fetch", e))?;

        let profile: Profile = decode_response(response, "profile fetch").await?;
        if profile.id.is_empty() {
            return Err(Error::MalformedResponse(
                "profile fetch: empty subject id".into(),
            ));
        }
        debug!(subject_id = %profile.id, "profile fetched");
        Ok(profile)
    }
}

//! Session token extraction for protected routes

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use session::SessionClaims;
use tracing::debug;

use crate::AppState;
use crate::error::ApiError;

/// Cookie carrying the session token for browser clients.
pub const SESSION_COOKIE: &str = "session";

/// Claims of a caller holding a valid session token.
///
/// The token is taken from `Authorization: Bearer <token>`, falling back to
/// the `session` cookie.
#[derive(Debug, Clone)]
pub struct SessionUser(pub SessionClaims);

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("missing session token".into()))?;

        let claims = state.manager.issuer().validate(&token).map_err(|e| {
            debug!(error = %e, "session token rejected");
            ApiError::Unauthorized("invalid or expired session token".into())
        })?;
        Ok(SessionUser(claims))
    }
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = bearer_token(headers) {
        return Some(token);
    }
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().trim().to_owned())
        .filter(|t| !t.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_owned())
}

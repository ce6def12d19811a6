//! Login flow and session-protected API handlers
//!
//! Endpoints:
//! - GET /: welcome page with a login link
//! - GET /login: start the Google authorization flow
//! - GET /oauth2callback: finish login, set the session cookie, hand off to the frontend
//! - GET /api/profile: fresh Google profile for the session's subject
//! - GET /api/token: a valid Google access token for the session's subject
//! - GET /api/me: the validated session claims

use std::future::Future;
use std::time::Duration;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::Uri;
use axum::response::{Html, Redirect};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use google_auth::Profile;
use serde::Deserialize;
use session::SessionClaims;
use tracing::{info, instrument};

use crate::AppState;
use crate::auth::{SESSION_COOKIE, SessionUser};
use crate::error::ApiError;

/// Cookie binding a login attempt to the browser that started it.
pub const STATE_COOKIE: &str = "oauth_state";

/// How long a login attempt may take before the state cookie lapses.
const STATE_COOKIE_MAX_AGE: time::Duration = time::Duration::minutes(10);

pub async fn home() -> Html<&'static str> {
    Html(
        "<html><body>\
         <h1>Google sign-in gateway</h1>\
         <p><a href=\"/login\">Sign in with Google</a></p>\
         </body></html>",
    )
}

/// GET /login
///
/// Each attempt gets a fresh random `state`. It travels to Google in the
/// authorization URL and stays behind in an HttpOnly cookie so the callback
/// can tell a genuine redirect from a forged one.
pub async fn login(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    let oauth_state = google_auth::generate_state();
    let url = state.manager.provider().authorization_url(&oauth_state);

    let cookie = Cookie::build((STATE_COOKIE, oauth_state))
        .http_only(true)
        .secure(state.secure_cookies)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(STATE_COOKIE_MAX_AGE)
        .build();

    info!("login started, redirecting to authorization endpoint");
    (jar.add(cookie), Redirect::temporary(&url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    /// Set by Google when the user declines consent.
    error: Option<String>,
}

/// GET /oauth2callback
#[instrument(skip_all)]
pub async fn oauth_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect), ApiError> {
    if let Some(reason) = params.error {
        return Err(ApiError::BadRequest(format!(
            "authorization was not granted: {reason}"
        )));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing authorization code".into()))?;

    let expected = jar.get(STATE_COOKIE).map(|c| c.value().to_owned());
    match (expected, params.state) {
        (Some(expected), Some(got)) if !expected.is_empty() && expected == got => {}
        _ => return Err(ApiError::BadRequest("state mismatch".into())),
    }

    let outcome = with_timeout(state.request_timeout, async {
        Ok::<_, ApiError>(state.manager.complete_login(&code).await?)
    })
    .await?;

    let user = serde_json::to_string(&outcome.profile)
        .map_err(|e| ApiError::Internal(format!("profile serialization failed: {e}")))?;
    let mut target = state.frontend_url.clone();
    target
        .query_pairs_mut()
        .append_pair("user", &user)
        .append_pair("token", &outcome.session_token);

    let session_cookie = Cookie::build((SESSION_COOKIE, outcome.session_token))
        .http_only(true)
        .secure(state.secure_cookies)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(
            i64::try_from(state.session_ttl.as_secs()).unwrap_or(i64::MAX),
        ))
        .build();
    let jar = jar
        .remove(Cookie::build(STATE_COOKIE).path("/"))
        .add(session_cookie);

    info!(subject_id = %outcome.profile.id, "login completed");
    Ok((jar, Redirect::to(target.as_str())))
}

/// GET /api/profile
pub async fn profile(
    State(state): State<AppState>,
    SessionUser(claims): SessionUser,
) -> Result<Json<Profile>, ApiError> {
    let profile = with_timeout(state.request_timeout, async {
        let access_token = state
            .manager
            .ensure_access_token(&claims.subject_id)
            .await?;
        Ok::<_, ApiError>(state.manager.provider().fetch_profile(&access_token).await?)
    })
    .await?;
    Ok(Json(profile))
}

/// GET /api/token
pub async fn access_token(
    State(state): State<AppState>,
    SessionUser(claims): SessionUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let access_token = with_timeout(state.request_timeout, async {
        Ok::<_, ApiError>(
            state
                .manager
                .ensure_access_token(&claims.subject_id)
                .await?,
        )
    })
    .await?;
    Ok(Json(serde_json::json!({ "access_token": access_token })))
}

/// GET /api/me
pub async fn me(SessionUser(claims): SessionUser) -> Json<SessionClaims> {
    Json(claims)
}

pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::RouteNotFound(uri.path().to_owned())
}

/// Bound a handler's outbound work. Dropping the future on expiry cancels
/// any in-flight provider call.
async fn with_timeout<T>(
    limit: Duration,
    work: impl Future<Output = Result<T, ApiError>>,
) -> Result<T, ApiError> {
    tokio::time::timeout(limit, work)
        .await
        .map_err(|_| ApiError::Timeout(limit.as_secs()))?
}

//! Login completion and access-token maintenance
//!
//! Per-subject states:
//! - Absent: no credential stored
//! - Valid: `now < expires_at`
//! - Expired: `now >= expires_at`
//!
//! Transitions:
//! - Absent/Expired → Valid (`complete_login`)
//! - Expired → Valid (`ensure_access_token` with a refresh token)
//!
//! Each provider and store call is attempted once per invocation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use google_auth::{Credential, CredentialStore, IdentityProvider, Profile, TokenSet};
use session::SessionIssuer;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{Error, Result};

/// Guard map size above which idle entries are dropped.
const GUARD_PRUNE_THRESHOLD: usize = 256;

/// Result of a completed login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub profile: Profile,
    pub session_token: String,
}

/// Owns the login and refresh flows for every subject.
pub struct CredentialManager {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn CredentialStore>,
    issuer: Arc<SessionIssuer>,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
    subject_guards: std::sync::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl CredentialManager {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn CredentialStore>,
        issuer: Arc<SessionIssuer>,
        clock: Arc<dyn Clock>,
        session_ttl: Duration,
    ) -> Self {
        info!(
            store = store.backend(),
            session_ttl_secs = session_ttl.as_secs(),
            "credential manager initialized"
        );
        Self {
            provider,
            store,
            issuer,
            clock,
            session_ttl,
            subject_guards: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    pub fn issuer(&self) -> &Arc<SessionIssuer> {
        &self.issuer
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Turn an authorization code into a stored credential and a session token.
    pub async fn complete_login(&self, code: &str) -> Result<LoginOutcome> {
        let token = self.provider.exchange_code(code).await.inspect_err(|e| {
            warn!(error = %e, "authorization code exchange failed");
            record_login("exchange_failed");
        })?;
        let issued_at = self.clock.now_millis();

        let profile = self
            .provider
            .fetch_profile(&token.access_token)
            .await
            .inspect_err(|e| {
                warn!(error = %e, "profile fetch failed during login");
                record_login("profile_failed");
            })?;
        let subject_id = profile.id.clone();

        let guard = self.subject_guard(&subject_id);
        let _held = guard.lock().await;

        let prior = match self.store.get_by_id(&subject_id).await {
            Ok(credential) => Some(credential),
            Err(google_auth::Error::NotFound(_)) => None,
            Err(e) => {
                record_login("persistence_failed");
                return Err(e.into());
            }
        };

        let credential = build_login_credential(&profile, &token, issued_at, prior.as_ref());
        if !credential.has_refresh_token() {
            warn!(subject_id, "login produced no refresh token; silent renewal unavailable");
        }

        self.store
            .upsert(credential.clone())
            .await
            .inspect_err(|e| {
                warn!(subject_id, error = %e, "failed to persist credential");
                record_login("persistence_failed");
            })?;

        let session_token = self.issuer.mint(
            &credential.subject_id,
            &credential.email,
            credential.is_admin,
            self.session_ttl,
        )?;

        info!(
            subject_id,
            returning = prior.is_some(),
            expires_at = credential.expires_at,
            "login completed"
        );
        record_login("success");

        Ok(LoginOutcome {
            profile,
            session_token,
        })
    }

    /// Return a usable access token for `subject_id`, refreshing it if expired.
    pub async fn ensure_access_token(&self, subject_id: &str) -> Result<String> {
        let guard = self.subject_guard(subject_id);
        let _held = guard.lock().await;

        let credential = self.store.get_by_id(subject_id).await?;
        if credential.is_valid_at(self.clock.now_millis()) {
            debug!(subject_id, "cached access token still valid");
            return Ok(credential.access_token);
        }

        if !credential.has_refresh_token() {
            record_refresh("missing_refresh_token");
            return Err(Error::MissingRefreshToken(format!(
                "subject {subject_id} must sign in again"
            )));
        }

        debug!(subject_id, "access token expired, refreshing");
        let token = self
            .provider
            .refresh_access_token(&credential.refresh_token)
            .await
            .inspect_err(|e| {
                warn!(subject_id, error = %e, "token refresh failed");
                record_refresh("provider_failed");
            })?;
        let issued_at = self.clock.now_millis();

        let rotated = token.issued_refresh_token().is_some();
        let refreshed = apply_refresh(credential, &token, issued_at);
        self.store
            .upsert(refreshed.clone())
            .await
            .inspect_err(|e| {
                warn!(subject_id, error = %e, "failed to persist refreshed credential");
                record_refresh("persistence_failed");
            })?;

        info!(
            subject_id,
            rotated,
            expires_at = refreshed.expires_at,
            "access token refreshed"
        );
        record_refresh("success");
        Ok(refreshed.access_token)
    }

    /// Async mutex serializing credential updates for one subject.
    fn subject_guard(&self, subject_id: &str) -> Arc<AsyncMutex<()>> {
        let mut guards = self
            .subject_guards
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if guards.len() > GUARD_PRUNE_THRESHOLD {
            guards.retain(|_, guard| Arc::strong_count(guard) > 1);
        }
        guards.entry(subject_id.to_owned()).or_default().clone()
    }
}

/// Build the credential written at login.
///
/// Refresh token precedence: freshly issued, then previously stored, then empty.
/// The admin flag is owned by the store and carried over unchanged.
fn build_login_credential(
    profile: &Profile,
    token: &TokenSet,
    issued_at: u64,
    prior: Option<&Credential>,
) -> Credential {
    let refresh_token = token
        .issued_refresh_token()
        .map(str::to_owned)
        .or_else(|| prior.map(|c| c.refresh_token.clone()))
        .unwrap_or_default();

    Credential {
        subject_id: profile.id.clone(),
        email: profile
            .email
            .clone()
            .or_else(|| prior.map(|c| c.email.clone()))
            .unwrap_or_default(),
        display_name: profile.name_or_default().to_owned(),
        picture_url: profile.picture_or_default().to_owned(),
        access_token: token.access_token.clone(),
        refresh_token,
        expires_at: token.expires_at(issued_at),
        is_admin: prior.is_some_and(|c| c.is_admin),
    }
}

/// Fold a refresh response into the stored credential. An empty or missing
/// refresh token in the response keeps the stored one.
fn apply_refresh(credential: Credential, token: &TokenSet, issued_at: u64) -> Credential {
    let refresh_token = match token.issued_refresh_token() {
        Some(rotated) => rotated.to_owned(),
        None => credential.refresh_token.clone(),
    };
    Credential {
        access_token: token.access_token.clone(),
        refresh_token,
        expires_at: token.expires_at(issued_at),
        ..credential
    }
}

fn record_login(outcome: &'static str) {
    metrics::counter!("gateway_logins_total", "outcome" => outcome).increment(1);
}

fn record_refresh(outcome: &'static str) {
    metrics::counter!("gateway_token_refreshes_total", "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use common::Secret;
    use google_auth::{BoxFuture, MemoryCredentialStore};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Start time for scenarios (2024-01-01T00:00:00Z).
    const T: u64 = 1_704_067_200_000;

    /// Provider double returning scripted responses and counting calls.
    #[derive(Default)]
    struct ScriptedProvider {
        exchanges: std::sync::Mutex<VecDeque<google_auth::Result<TokenSet>>>,
        refreshes: std::sync::Mutex<VecDeque<google_auth::Result<TokenSet>>>,
        profile: std::sync::Mutex<Option<google_auth::Result<Profile>>>,
        exchange_calls: AtomicUsize,
        refresh_calls: AtomicUsize,
        refreshed_with: std::sync::Mutex<Vec<String>>,
        refresh_delay: Option<Duration>,
    }

    impl ScriptedProvider {
        fn push_exchange(&self, token: google_auth::Result<TokenSet>) {
            self.exchanges.lock().unwrap().push_back(token);
        }

        fn push_refresh(&self, token: google_auth::Result<TokenSet>) {
            self.refreshes.lock().unwrap().push_back(token);
        }

        fn set_profile(&self, profile: google_auth::Result<Profile>) {
            *self.profile.lock().unwrap() = Some(profile);
        }

        fn refresh_calls(&self) -> usize {
            self.refresh_calls.load(Ordering::SeqCst)
        }
    }

    impl IdentityProvider for ScriptedProvider {
        fn authorization_url(&self, state: &str) -> String {
            format!("https://idp.test/auth?state={state}")
        }

        fn exchange_code<'a>(
            &'a self,
            _code: &'a str,
        ) -> BoxFuture<'a, google_auth::Result<TokenSet>> {
            Box::pin(async move {
                self.exchange_calls.fetch_add(1, Ordering::SeqCst);
                self.exchanges
                    .lock()
                    .unwrap()
                    .pop_front()
                    .expect("unexpected exchange call")
            })
        }

        fn refresh_access_token<'a>(
            &'a self,
            refresh_token: &'a str,
        ) -> BoxFuture<'a, google_auth::Result<TokenSet>> {
            Box::pin(async move {
                self.refresh_calls.fetch_add(1, Ordering::SeqCst);
                self.refreshed_with
                    .lock()
                    .unwrap()
                    .push(refresh_token.to_owned());
                if let Some(delay) = self.refresh_delay {
                    tokio::time::sleep(delay).await;
                }
                self.refreshes
                    .lock()
                    .unwrap()
                    .pop_front()
                    .expect("unexpected refresh call")
            })
        }

        fn fetch_profile<'a>(
            &'a self,
            _access_token: &'a str,
        ) -> BoxFuture<'a, google_auth::Result<Profile>> {
            Box::pin(async move {
                match self.profile.lock().unwrap().as_ref() {
                    Some(Ok(profile)) => Ok(profile.clone()),
                    Some(Err(e)) => Err(google_auth::Error::Provider(e.to_string())),
                    None => panic!("unexpected profile call"),
                }
            })
        }
    }

    /// Store whose writes always fail.
    #[derive(Default)]
    struct ReadOnlyStore {
        inner: MemoryCredentialStore,
    }

    impl CredentialStore for ReadOnlyStore {
        fn upsert(&self, _credential: Credential) -> BoxFuture<'_, google_auth::Result<()>> {
            Box::pin(async { Err(google_auth::Error::Persistence("disk full".into())) })
        }

        fn get_by_id<'a>(
            &'a self,
            subject_id: &'a str,
        ) -> BoxFuture<'a, google_auth::Result<Credential>> {
            self.inner.get_by_id(subject_id)
        }

        fn backend(&self) -> &'static str {
            "read-only"
        }
    }

    fn token(access: &str, refresh: Option<&str>, expires_in: u64) -> TokenSet {
        TokenSet {
            access_token: access.into(),
            refresh_token: refresh.map(str::to_owned),
            id_token: None,
            token_type: "Bearer".into(),
            expires_in,
        }
    }

    fn profile(id: &str) -> Profile {
        Profile {
            id: id.into(),
            email: Some(format!("{id}@example.com")),
            name: Some(format!("User {id}")),
            picture: Some(format!("https://img.test/{id}.png")),
            ..Default::default()
        }
    }

    fn stored(subject: &str, access: &str, refresh: &str, expires_at: u64) -> Credential {
        Credential {
            subject_id: subject.into(),
            email: format!("{subject}@example.com"),
            display_name: String::new(),
            picture_url: String::new(),
            access_token: access.into(),
            refresh_token: refresh.into(),
            expires_at,
            is_admin: false,
        }
    }

    fn issuer() -> Arc<SessionIssuer> {
        Arc::new(SessionIssuer::new(&Secret::new("test-signing-secret".to_string())).unwrap())
    }

    struct Harness {
        manager: CredentialManager,
        provider: Arc<ScriptedProvider>,
        store: Arc<MemoryCredentialStore>,
        clock: Arc<ManualClock>,
    }

    fn harness_with(provider: ScriptedProvider) -> Harness {
        let provider = Arc::new(provider);
        let store = Arc::new(MemoryCredentialStore::new());
        let clock = Arc::new(ManualClock::new(T));
        let manager = CredentialManager::new(
            provider.clone(),
            store.clone(),
            issuer(),
            clock.clone(),
            Duration::from_secs(3600),
        );
        Harness {
            manager,
            provider,
            store,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with(ScriptedProvider::default())
    }

    #[tokio::test]
    async fn login_stores_credential_with_absolute_expiry() {
        let h = harness();
        h.provider.push_exchange(Ok(token("A1", Some("R1"), 3600)));
        h.provider.set_profile(Ok(profile("u1")));

        let outcome = h.manager.complete_login("abc").await.unwrap();
        assert_eq!(outcome.profile.id, "u1");

        let cred = h.store.get_by_id("u1").await.unwrap();
        assert_eq!(cred.expires_at, T + 3_600_000);
        assert_eq!(cred.refresh_token, "R1");
        assert_eq!(cred.access_token, "A1");
        assert_eq!(cred.email, "u1@example.com");
        assert_eq!(cred.display_name, "User u1");
        assert_eq!(cred.picture_url, "https://img.test/u1.png");
    }

    #[tokio::test]
    async fn login_session_token_validates_with_profile_claims() {
        let h = harness();
        h.provider.push_exchange(Ok(token("A1", Some("R1"), 3600)));
        h.provider.set_profile(Ok(profile("u1")));

        let outcome = h.manager.complete_login("abc").await.unwrap();
        let claims = h.manager.issuer().validate(&outcome.session_token).unwrap();
        assert_eq!(claims.subject_id, "u1");
        assert_eq!(claims.email, "u1@example.com");
        assert!(!claims.is_admin);
        assert_eq!(claims.expires_at - claims.issued_at, 3600);
    }

    #[tokio::test]
    async fn relogin_without_refresh_token_keeps_stored_one() {
        let h = harness();
        h.store
            .upsert(stored("u1", "A0", "R0", T - 1))
            .await
            .unwrap();
        h.provider.push_exchange(Ok(token("A1", None, 3600)));
        h.provider.set_profile(Ok(profile("u1")));

        h.manager.complete_login("abc").await.unwrap();
        let cred = h.store.get_by_id("u1").await.unwrap();
        assert_eq!(cred.access_token, "A1");
        assert_eq!(cred.refresh_token, "R0");
    }

    #[tokio::test]
    async fn relogin_with_new_refresh_token_replaces_stored_one() {
        let h = harness();
        h.store.upsert(stored("u1", "A0", "R0", T - 1)).await.unwrap();
        h.provider.push_exchange(Ok(token("A1", Some("R1"), 3600)));
        h.provider.set_profile(Ok(profile("u1")));

        h.manager.complete_login("abc").await.unwrap();
        assert_eq!(h.store.get_by_id("u1").await.unwrap().refresh_token, "R1");
    }

    #[tokio::test]
    async fn first_login_without_refresh_token_stores_empty() {
        let h = harness();
        h.provider.push_exchange(Ok(token("A1", Some(""), 3600)));
        h.provider.set_profile(Ok(profile("u1")));

        h.manager.complete_login("abc").await.unwrap();
        assert!(!h.store.get_by_id("u1").await.unwrap().has_refresh_token());
    }

    #[tokio::test]
    async fn relogin_preserves_admin_flag() {
        let h = harness();
        let mut admin = stored("u1", "A0", "R0", T - 1);
        admin.is_admin = true;
        h.store.upsert(admin).await.unwrap();
        h.provider.push_exchange(Ok(token("A1", None, 3600)));
        h.provider.set_profile(Ok(profile("u1")));

        let outcome = h.manager.complete_login("abc").await.unwrap();
        assert!(h.store.get_by_id("u1").await.unwrap().is_admin);
        let claims = h.manager.issuer().validate(&outcome.session_token).unwrap();
        assert!(claims.is_admin);
    }

    #[tokio::test]
    async fn login_propagates_exchange_errors_unchanged() {
        let h = harness();
        h.provider.push_exchange(Err(google_auth::Error::MalformedResponse("html".into())));

        let err = h.manager.complete_login("abc").await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)), "got {err:?}");
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn login_propagates_profile_errors() {
        let h = harness();
        h.provider.push_exchange(Ok(token("A1", Some("R1"), 3600)));
        h.provider.set_profile(Err(google_auth::Error::Provider("401".into())));

        let err = h.manager.complete_login("abc").await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)), "got {err:?}");
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn login_persistence_failure_is_fatal() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.push_exchange(Ok(token("A1", Some("R1"), 3600)));
        provider.set_profile(Ok(profile("u1")));
        let manager = CredentialManager::new(
            provider,
            Arc::new(ReadOnlyStore::default()),
            issuer(),
            Arc::new(ManualClock::new(T)),
            Duration::from_secs(3600),
        );

        let err = manager.complete_login("abc").await.unwrap_err();
        assert!(matches!(err, Error::Persistence(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn valid_token_is_returned_without_provider_calls() {
        let h = harness();
        h.store
            .upsert(stored("u1", "A1", "R1", T + 60_000))
            .await
            .unwrap();

        for _ in 0..3 {
            assert_eq!(h.manager.ensure_access_token("u1").await.unwrap(), "A1");
        }
        assert_eq!(h.provider.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn token_expiring_exactly_now_is_refreshed() {
        let h = harness();
        h.store.upsert(stored("u1", "A1", "R1", T)).await.unwrap();
        h.provider.push_refresh(Ok(token("A2", None, 1800)));

        assert_eq!(h.manager.ensure_access_token("u1").await.unwrap(), "A2");
        assert_eq!(h.provider.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn expired_token_refresh_keeps_refresh_token_when_not_rotated() {
        let h = harness();
        h.store
            .upsert(stored("u1", "A1", "R1", T - 1_000))
            .await
            .unwrap();
        h.provider.push_refresh(Ok(token("A2", Some(""), 1800)));

        let access = h.manager.ensure_access_token("u1").await.unwrap();
        assert_eq!(access, "A2");
        assert_eq!(h.provider.refresh_calls(), 1);
        assert_eq!(
            h.provider.refreshed_with.lock().unwrap().as_slice(),
            ["R1".to_string()]
        );

        let cred = h.store.get_by_id("u1").await.unwrap();
        assert_eq!(cred.refresh_token, "R1");
        assert_eq!(cred.access_token, "A2");
        assert_eq!(cred.expires_at, T + 1_800_000);
    }

    #[tokio::test]
    async fn rotated_refresh_token_replaces_stored_one() {
        let h = harness();
        h.store.upsert(stored("u1", "A1", "R1", T - 1)).await.unwrap();
        h.provider.push_refresh(Ok(token("A2", Some("R2"), 1800)));

        h.manager.ensure_access_token("u1").await.unwrap();
        assert_eq!(h.store.get_by_id("u1").await.unwrap().refresh_token, "R2");
    }

    #[tokio::test]
    async fn refreshed_token_is_cached_until_new_expiry() {
        let h = harness();
        h.store.upsert(stored("u1", "A1", "R1", T - 1)).await.unwrap();
        h.provider.push_refresh(Ok(token("A2", None, 1800)));
        h.provider.push_refresh(Ok(token("A3", None, 1800)));

        assert_eq!(h.manager.ensure_access_token("u1").await.unwrap(), "A2");
        h.clock.advance_secs(1799);
        assert_eq!(h.manager.ensure_access_token("u1").await.unwrap(), "A2");
        assert_eq!(h.provider.refresh_calls(), 1);

        h.clock.advance_secs(1);
        assert_eq!(h.manager.ensure_access_token("u1").await.unwrap(), "A3");
        assert_eq!(h.provider.refresh_calls(), 2);
    }

    #[tokio::test]
    async fn unknown_subject_is_not_found() {
        let h = harness();
        let err = h.manager.ensure_access_token("u2").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "got {err:?}");
        assert_eq!(h.provider.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn expired_without_refresh_token_requires_relogin() {
        let h = harness();
        h.store.upsert(stored("u1", "A1", "", T - 1)).await.unwrap();

        let err = h.manager.ensure_access_token("u1").await.unwrap_err();
        assert!(matches!(err, Error::MissingRefreshToken(_)), "got {err:?}");
        assert_eq!(h.provider.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn refresh_failure_leaves_credential_untouched() {
        let h = harness();
        let before = stored("u1", "A1", "R1", T - 1);
        h.store.upsert(before.clone()).await.unwrap();
        h.provider.push_refresh(Err(google_auth::Error::Provider("invalid_grant".into())));

        let err = h.manager.ensure_access_token("u1").await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)), "got {err:?}");
        assert_eq!(h.store.get_by_id("u1").await.unwrap(), before);
        assert_eq!(h.provider.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn refresh_persistence_failure_propagates() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.push_refresh(Ok(token("A2", None, 1800)));
        let store = Arc::new(ReadOnlyStore::default());
        store
            .inner
            .upsert(stored("u1", "A1", "R1", T - 1))
            .await
            .unwrap();
        let manager = CredentialManager::new(
            provider,
            store,
            issuer(),
            Arc::new(ManualClock::new(T)),
            Duration::from_secs(3600),
        );

        let err = manager.ensure_access_token("u1").await.unwrap_err();
        assert!(matches!(err, Error::Persistence(_)), "got {err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_refresh() {
        let h = harness_with(ScriptedProvider {
            refresh_delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        h.store.upsert(stored("u1", "A1", "R1", T - 1)).await.unwrap();
        h.provider.push_refresh(Ok(token("A2", Some("R2"), 1800)));

        let manager = Arc::new(h.manager);
        let mut handles = vec![];
        for _ in 0..8 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager.ensure_access_token("u1").await.unwrap()
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), "A2");
        }
        assert_eq!(h.provider.refresh_calls(), 1);
        assert_eq!(h.store.get_by_id("u1").await.unwrap().refresh_token, "R2");
    }

    #[tokio::test]
    async fn different_subjects_refresh_independently() {
        let h = harness();
        h.store.upsert(stored("u1", "A1", "R1", T - 1)).await.unwrap();
        h.store.upsert(stored("u2", "B1", "S1", T - 1)).await.unwrap();
        h.provider.push_refresh(Ok(token("X", None, 1800)));
        h.provider.push_refresh(Ok(token("Y", None, 1800)));

        let (a, b) = tokio::join!(
            h.manager.ensure_access_token("u1"),
            h.manager.ensure_access_token("u2")
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(h.provider.refresh_calls(), 2);
    }

    #[test]
    fn idle_guards_are_pruned() {
        let h = harness();
        for i in 0..=GUARD_PRUNE_THRESHOLD + 10 {
            let _ = h.manager.subject_guard(&format!("u{i}"));
        }
        let held = h.manager.subject_guard("held");
        let _ = h.manager.subject_guard("trigger");

        let guards = h.manager.subject_guards.lock().unwrap();
        assert!(guards.len() <= GUARD_PRUNE_THRESHOLD);
        assert!(guards.contains_key("held"));
        drop(held);
    }
}

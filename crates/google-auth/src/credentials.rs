//! Credential storage for Google OAuth tokens
//!
//! One record per subject id, upsert and point lookup only. Two backends
//! share the `CredentialStore` contract:
//! - `MemoryCredentialStore` keeps records in a process-local map.
//! - `FileCredentialStore` mirrors the map into a JSON file. Writes use an
//!   atomic temp-file + rename, and the in-memory map only changes after the
//!   file write succeeds, so a failed write leaves no partial state behind.
//!   The write and the map swap run in a spawned task, so a caller that is
//!   dropped mid-upsert cannot leave the file and the map disagreeing.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::client::BoxFuture;
use crate::error::{Error, Result};

/// Current wall clock as unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A single user's OAuth credential.
///
/// `expires_at` is a unix timestamp in milliseconds (absolute, not a delta),
/// computed once from `TokenSet::expires_in` when the token was issued.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub subject_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub picture_url: String,
    pub access_token: String,
    /// Empty when Google never issued one for this subject.
    #[serde(default)]
    pub refresh_token: String,
    pub expires_at: u64,
    #[serde(default)]
    pub is_admin: bool,
}

impl Credential {
    /// Whether the access token is still usable at `now_millis`.
    pub fn is_valid_at(&self, now_millis: u64) -> bool {
        now_millis < self.expires_at
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("subject_id", &self.subject_id)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("picture_url", &self.picture_url)
            .field("access_token", &"[REDACTED]")
            .field("has_refresh_token", &self.has_refresh_token())
            .field("expires_at", &self.expires_at)
            .field("is_admin", &self.is_admin)
            .finish()
    }
}

/// Keyed credential persistence.
///
/// `upsert` replaces the whole record for `credential.subject_id` atomically;
/// readers never observe a mix of old and new fields. Applying the same record
/// twice leaves the same state as applying it once.
pub trait CredentialStore: Send + Sync {
    fn upsert(&self, credential: Credential) -> BoxFuture<'_, Result<()>>;

    /// Fails with `Error::NotFound` when no record exists.
    fn get_by_id<'a>(&'a self, subject_id: &'a str) -> BoxFuture<'a, Result<Credential>>;

    /// Backend label for health reporting.
    fn backend(&self) -> &'static str;
}

fn not_found(subject_id: &str) -> Error {
    Error::NotFound(format!("no credential for subject {subject_id}"))
}

/// Process-local credential store.
#[derive(Default)]
pub struct MemoryCredentialStore {
    state: RwLock<HashMap<String, Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn upsert(&self, credential: Credential) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            debug!(subject_id = %credential.subject_id, "upserted credential");
            state.insert(credential.subject_id.clone(), credential);
            Ok(())
        })
    }

    fn get_by_id<'a>(&'a self, subject_id: &'a str) -> BoxFuture<'a, Result<Credential>> {
        Box::pin(async move {
            let state = self.state.read().await;
            state
                .get(subject_id)
                .cloned()
                .ok_or_else(|| not_found(subject_id))
        })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// JSON-file backed credential store.
///
/// The Mutex serializes writers; reads clone a single record under the lock.
pub struct FileCredentialStore {
    path: Arc<PathBuf>,
    state: Arc<Mutex<HashMap<String, Credential>>>,
}

impl FileCredentialStore {
    /// Load credentials from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}` (cold start with zero
    /// subjects).
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if tokio::fs::try_exists(&path)
            .await
            .map_err(|e| Error::Persistence(format!("checking credential file: {e}")))?
        {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Persistence(format!("reading credential file: {e}")))?;
            let credentials: HashMap<String, Credential> = serde_json::from_str(&contents)
                .map_err(|e| Error::Persistence(format!("parsing credential file: {e}")))?;
            info!(path = %path.display(), subjects = credentials.len(), "loaded credentials");
            credentials
        } else {
            info!(path = %path.display(), "credential file not found, starting with empty store");
            let store = HashMap::new();
            write_atomic(&path, &store).await?;
            store
        };

        Ok(Self {
            path: Arc::new(path),
            state: Arc::new(Mutex::new(state)),
        })
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl CredentialStore for FileCredentialStore {
    fn upsert(&self, credential: Credential) -> BoxFuture<'_, Result<()>> {
        let path = Arc::clone(&self.path);
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            // Detached: runs to completion even if this future is dropped.
            let commit = tokio::spawn(async move {
                let mut state = state.lock().await;
                let mut next = state.clone();
                let subject_id = credential.subject_id.clone();
                next.insert(subject_id.clone(), credential);
                write_atomic(&path, &next).await?;
                *state = next;
                debug!(subject_id, "upserted credential");
                Ok::<_, Error>(())
            });
            commit
                .await
                .map_err(|e| Error::Persistence(format!("credential write task failed: {e}")))?
        })
    }

    fn get_by_id<'a>(&'a self, subject_id: &'a str) -> BoxFuture<'a, Result<Credential>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            state
                .get(subject_id)
                .cloned()
                .ok_or_else(|| not_found(subject_id))
        })
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}

/// Write credentials to a file atomically.
///
/// Each write gets its own uniquely named temp file in the target's
/// directory, which is then renamed over the target. Permissions are 0600
/// since the file contains OAuth tokens.
async fn write_atomic(path: &Path, data: &HashMap<String, Credential>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Persistence(format!("serializing credentials: {e}")))?;
    let target = path.to_path_buf();

    tokio::task::spawn_blocking(move || persist_file(&target, json.as_bytes()))
        .await
        .map_err(|e| Error::Persistence(format!("credential write task failed: {e}")))??;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}

fn persist_file(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        Some(_) => Path::new("."),
        None => {
            return Err(Error::Persistence(
                "credential path has no parent directory".into(),
            ));
        }
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".credentials.")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| Error::Persistence(format!("creating temp credential file: {e}")))?;

    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| Error::Persistence(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::Persistence(format!("setting credential file permissions: {e}")))?;
    }

    tmp.persist(path)
        .map_err(|e| Error::Persistence(format!("renaming temp credential file: {}", e.error)))?;
    Ok(())
}

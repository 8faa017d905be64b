//! Token store implementations.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Lifetime of a stored session: 7 days.
pub const SESSION_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;

/// The current session credential.
///
/// Field names match the backend's auth payload (`token`, `refreshToken`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCredential {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl SessionCredential {
    pub fn new(token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            token: token.into(),
            refresh_token,
        }
    }

    pub fn access_only(token: impl Into<String>) -> Self {
        Self::new(token, None)
    }
}

/// Persistence primitive for the session credential. No validation happens here.
///
/// Implementations must never panic or surface errors: storage that cannot be
/// read behaves as an empty store and failed writes are dropped.
pub trait TokenStore: Send + Sync {
    fn get_credential(&self) -> Option<SessionCredential>;

    /// Overwrite the stored credential, restarting its expiry window.
    fn set_credential(&self, credential: SessionCredential);

    /// Remove the credential. Idempotent.
    fn clear(&self);

    /// Atomically replace the credential only if it still equals `expected`.
    /// Returns false (and writes nothing) when another writer got there first.
    fn replace_if(&self, expected: &SessionCredential, next: SessionCredential) -> bool;

    /// Clear the credential only if it still equals `expected`.
    /// Returns whether the store is empty afterwards; false means a newer
    /// session was written and has been kept.
    fn clear_if(&self, expected: &SessionCredential) -> bool;

    fn get_token(&self) -> Option<String> {
        self.get_credential().map(|c| c.token)
    }

    /// Store an access token on its own, dropping any refresh token.
    fn set_token(&self, token: &str) {
        self.set_credential(SessionCredential::access_only(token));
    }

    fn clear_token(&self) {
        self.clear();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    credential: SessionCredential,
    expires_at: u64,
}

impl StoredSession {
    fn new(credential: SessionCredential, max_age_secs: u64) -> Self {
        Self {
            credential,
            expires_at: now_secs().saturating_add(max_age_secs),
        }
    }

    fn live(self) -> Option<SessionCredential> {
        (now_secs() < self.expires_at).then_some(self.credential)
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

// =============================================================================
// In-memory store
// =============================================================================

/// Process-local token store.
pub struct MemoryTokenStore {
    inner: RwLock<Option<StoredSession>>,
    max_age_secs: u64,
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::with_max_age(SESSION_MAX_AGE_SECS)
    }

    pub fn with_max_age(max_age_secs: u64) -> Self {
        Self {
            inner: RwLock::new(None),
            max_age_secs,
        }
    }

    /// Store pre-populated with a credential.
    pub fn with_credential(credential: SessionCredential) -> Self {
        let store = Self::new();
        store.set_credential(credential);
        store
    }
}

impl TokenStore for MemoryTokenStore {
    fn get_credential(&self) -> Option<SessionCredential> {
        let guard = self.inner.read().ok()?;
        guard.clone().and_then(StoredSession::live)
    }

    fn set_credential(&self, credential: SessionCredential) {
        match self.inner.write() {
            Ok(mut guard) => *guard = Some(StoredSession::new(credential, self.max_age_secs)),
            Err(_) => warn!("Token store lock poisoned, dropping write"),
        }
    }

    fn clear(&self) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = None;
        }
    }

    fn replace_if(&self, expected: &SessionCredential, next: SessionCredential) -> bool {
        let Ok(mut guard) = self.inner.write() else {
            return false;
        };
        let current = guard.clone().and_then(StoredSession::live);
        if current.as_ref() != Some(expected) {
            return false;
        }
        *guard = Some(StoredSession::new(next, self.max_age_secs));
        true
    }

    fn clear_if(&self, expected: &SessionCredential) -> bool {
        let Ok(mut guard) = self.inner.write() else {
            return false;
        };
        match guard.clone().and_then(StoredSession::live) {
            Some(current) if current != *expected => false,
            _ => {
                *guard = None;
                true
            }
        }
    }
}

// =============================================================================
// File-backed store
// =============================================================================

/// Durable token store keeping the credential in a JSON file.
///
/// Used by the command-line client, which has no browser cookie jar.
pub struct FileTokenStore {
    path: PathBuf,
    max_age_secs: u64,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_age_secs: SESSION_MAX_AGE_SECS,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Option<SessionCredential> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No readable session file");
                return None;
            }
        };
        match serde_json::from_slice::<StoredSession>(&bytes) {
            Ok(stored) => stored.live(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring corrupt session file");
                None
            }
        }
    }

    fn write(&self, credential: SessionCredential) {
        let stored = StoredSession::new(credential, self.max_age_secs);
        if let Err(e) = self.write_atomic(&stored) {
            warn!(path = %self.path.display(), error = %e, "Failed to persist session");
        }
    }

    fn write_atomic(&self, stored: &StoredSession) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_vec(stored)?;
        let tmp = self.path.with_extension("tmp");

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&tmp)?;
        file.write_all(&json)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)
    }

    fn remove(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove session file"),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn get_credential(&self) -> Option<SessionCredential> {
        let _guard = self.lock.lock().ok()?;
        self.read()
    }

    fn set_credential(&self, credential: SessionCredential) {
        match self.lock.lock() {
            Ok(_guard) => self.write(credential),
            Err(_) => warn!("Token store lock poisoned, dropping write"),
        }
    }

    fn clear(&self) {
        if let Ok(_guard) = self.lock.lock() {
            self.remove();
        }
    }

    fn replace_if(&self, expected: &SessionCredential, next: SessionCredential) -> bool {
        let Ok(_guard) = self.lock.lock() else {
            return false;
        };
        if self.read().as_ref() != Some(expected) {
            return false;
        }
        self.write(next);
        true
    }

    fn clear_if(&self, expected: &SessionCredential) -> bool {
        let Ok(_guard) = self.lock.lock() else {
            return false;
        };
        match self.read() {
            Some(current) if current != *expected => false,
            _ => {
                self.remove();
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_session_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("restaurantos-store-{}-{}", std::process::id(), name))
            .join("session.json")
    }

    #[test]
    fn test_memory_round_trip() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get_token(), None);

        store.set_token("t");
        assert_eq!(store.get_token().as_deref(), Some("t"));

        store.clear_token();
        assert_eq!(store.get_token(), None);
        // Idempotent
        store.clear_token();
        assert_eq!(store.get_token(), None);
    }

    #[test]
    fn test_set_token_overwrites_refresh_token() {
        let store = MemoryTokenStore::with_credential(SessionCredential::new(
            "old",
            Some("refresh".into()),
        ));

        store.set_token("new");
        assert_eq!(
            store.get_credential(),
            Some(SessionCredential::access_only("new"))
        );
    }

    #[test]
    fn test_expired_session_reads_as_absent() {
        let store = MemoryTokenStore::with_max_age(0);
        store.set_token("t");
        assert_eq!(store.get_token(), None);
    }

    #[test]
    fn test_replace_if_only_swaps_expected() {
        let first = SessionCredential::new("a", Some("ra".into()));
        let store = MemoryTokenStore::with_credential(first.clone());

        let newer = SessionCredential::new("login", Some("rl".into()));
        store.set_credential(newer.clone());

        // A refresh derived from `first` must not clobber the newer login
        assert!(!store.replace_if(&first, SessionCredential::new("b", None)));
        assert_eq!(store.get_credential(), Some(newer.clone()));

        assert!(store.replace_if(&newer, SessionCredential::new("c", None)));
        assert_eq!(store.get_token().as_deref(), Some("c"));
    }

    #[test]
    fn test_clear_if_keeps_newer_session() {
        let stale = SessionCredential::new("a", Some("ra".into()));
        let store = MemoryTokenStore::with_credential(stale.clone());

        let newer = SessionCredential::new("login", None);
        store.set_credential(newer.clone());
        assert!(!store.clear_if(&stale));
        assert_eq!(store.get_credential(), Some(newer.clone()));

        assert!(store.clear_if(&newer));
        assert_eq!(store.get_credential(), None);
        // Already empty
        assert!(store.clear_if(&newer));
    }

    #[test]
    fn test_file_clear_if() {
        let path = temp_session_path("clear-if");
        let store = FileTokenStore::new(&path);
        let stale = SessionCredential::access_only("a");
        store.set_credential(SessionCredential::access_only("b"));

        assert!(!store.clear_if(&stale));
        assert_eq!(store.get_token().as_deref(), Some("b"));
        assert!(store.clear_if(&SessionCredential::access_only("b")));
        assert_eq!(store.get_token(), None);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_round_trip() {
        let path = temp_session_path("round-trip");
        let store = FileTokenStore::new(&path);
        store.clear();
        assert_eq!(store.get_credential(), None);

        let credential = SessionCredential::new("abc", Some("r1".into()));
        store.set_credential(credential.clone());

        // A second handle on the same file sees the credential
        let reopened = FileTokenStore::new(&path);
        assert_eq!(reopened.get_credential(), Some(credential));

        reopened.clear();
        assert_eq!(store.get_token(), None);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_corrupt_reads_as_absent() {
        let path = temp_session_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"{not json").unwrap();

        let store = FileTokenStore::new(&path);
        assert_eq!(store.get_token(), None);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_unwritable_is_noop() {
        // Parent "directory" is a regular file, so every write fails
        let blocker = std::env::temp_dir().join(format!(
            "restaurantos-store-{}-blocker",
            std::process::id()
        ));
        fs::write(&blocker, b"").unwrap();

        let store = FileTokenStore::new(blocker.join("session.json"));
        store.set_token("t");
        assert_eq!(store.get_token(), None);
        store.clear();
        let _ = fs::remove_file(&blocker);
    }
}

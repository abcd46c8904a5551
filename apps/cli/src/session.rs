//! Persistent client session: token pair, cached identifiers, language.
//!
//! Storage sits behind `SessionBackend` so tests can run against an
//! in-memory backend. The file backend writes a temp sibling and renames
//! it into place, so a crash mid-write never leaves a torn session and a
//! token pair is stored either whole or not at all.
//!
//! `SessionStore` keeps the current value in a tokio watch channel:
//! reads borrow the latest snapshot, every committed update broadcasts
//! to subscribers. Updates are read-modify-write without locking; the
//! CLI drives them from a single task.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::warn;

const SESSION_FILE: &str = "session.json";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("no usable state directory for session storage")]
    NoStateDir,
}

/// Everything the client remembers between invocations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub display_name: Option<String>,
    pub last_cv_id: Option<String>,
    pub last_quiz_id: Option<String>,
    pub last_result_id: Option<String>,
    pub language: Option<String>,
}

pub trait SessionBackend: Send + Sync {
    /// Loads the stored session, `None` when absent or unreadable.
    fn load(&self) -> Result<Option<SessionData>, SessionError>;

    /// Persists a full session snapshot.
    fn persist(&self, data: &SessionData) -> Result<(), SessionError>;
}

// ────────────────────────────────────────────
// Backends
// ────────────────────────────────────────────

/// JSON file under the platform data directory.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Default session path, e.g. `~/.local/share/vericv/session.json`.
    pub fn default_path() -> Result<PathBuf, SessionError> {
        let dirs = ProjectDirs::from("", "", "vericv").ok_or(SessionError::NoStateDir)?;
        Ok(dirs.data_local_dir().join(SESSION_FILE))
    }
}

impl SessionBackend for FileBackend {
    fn load(&self) -> Result<Option<SessionData>, SessionError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(data) => Ok(Some(data)),
            Err(e) => {
                // A corrupt session is discarded, not fatal.
                warn!("Ignoring unreadable session file {:?}: {e}", self.path);
                Ok(None)
            }
        }
    }

    fn persist(&self, data: &SessionData) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write-then-rename keeps the stored session whole under crashes.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(data)?)?;
        std::fs::rename(&tmp, &self.path)?;

        Ok(())
    }
}

/// In-memory backend for tests.
#[allow(dead_code)]
#[derive(Default)]
pub struct MemoryBackend {
    data: Mutex<Option<SessionData>>,
}

impl SessionBackend for MemoryBackend {
    fn load(&self) -> Result<Option<SessionData>, SessionError> {
        Ok(self.data.lock().ok().and_then(|guard| guard.clone()))
    }

    fn persist(&self, data: &SessionData) -> Result<(), SessionError> {
        if let Ok(mut guard) = self.data.lock() {
            *guard = Some(data.clone());
        }
        Ok(())
    }
}

// ────────────────────────────────────────────
// Store
// ────────────────────────────────────────────

/// Handle to the session. Cheap to clone; clones share state and
/// change notifications.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    channel: Arc<watch::Sender<SessionData>>,
}

impl SessionStore {
    pub fn open(backend: Arc<dyn SessionBackend>) -> Result<Self, SessionError> {
        let initial = backend.load()?.unwrap_or_default();
        let (tx, _rx) = watch::channel(initial);
        Ok(Self {
            backend,
            channel: Arc::new(tx),
        })
    }

    #[allow(dead_code)] // Used in tests
    pub fn in_memory() -> Self {
        // MemoryBackend::load never fails on a fresh backend.
        let (tx, _rx) = watch::channel(SessionData::default());
        Self {
            backend: Arc::new(MemoryBackend::default()),
            channel: Arc::new(tx),
        }
    }

    /// Current session snapshot.
    pub fn snapshot(&self) -> SessionData {
        self.channel.borrow().clone()
    }

    /// Change notifications. Receivers observe every committed update.
    #[allow(dead_code)] // Used in tests
    pub fn subscribe(&self) -> watch::Receiver<SessionData> {
        self.channel.subscribe()
    }

    pub fn access_token(&self) -> Option<String> {
        self.channel.borrow().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.channel.borrow().refresh_token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.channel
            .borrow()
            .access_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }

    /// Stores a token pair. Persistence happens before the in-memory
    /// commit, so observers never see a pair the disk does not have.
    pub fn set_token_pair(&self, access: &str, refresh: &str) -> Result<(), SessionError> {
        self.update(|data| {
            data.access_token = Some(access.to_string());
            data.refresh_token = Some(refresh.to_string());
        })
    }

    /// Replaces only the access token (the refresh exchange).
    pub fn set_access_token(&self, access: &str) -> Result<(), SessionError> {
        self.update(|data| data.access_token = Some(access.to_string()))
    }

    /// Drops both tokens; cached identifiers survive logout.
    pub fn clear_tokens(&self) -> Result<(), SessionError> {
        self.update(|data| {
            data.access_token = None;
            data.refresh_token = None;
        })
    }

    pub fn display_name(&self) -> Option<String> {
        self.channel.borrow().display_name.clone()
    }

    pub fn set_display_name(&self, name: &str) -> Result<(), SessionError> {
        self.update(|data| data.display_name = Some(name.to_string()))
    }

    pub fn last_cv_id(&self) -> Option<String> {
        self.channel.borrow().last_cv_id.clone()
    }

    pub fn set_last_cv_id(&self, id: &str) -> Result<(), SessionError> {
        self.update(|data| data.last_cv_id = Some(id.to_string()))
    }

    pub fn last_quiz_id(&self) -> Option<String> {
        self.channel.borrow().last_quiz_id.clone()
    }

    pub fn set_last_quiz_id(&self, id: &str) -> Result<(), SessionError> {
        self.update(|data| data.last_quiz_id = Some(id.to_string()))
    }

    pub fn last_result_id(&self) -> Option<String> {
        self.channel.borrow().last_result_id.clone()
    }

    pub fn set_last_result_id(&self, id: &str) -> Result<(), SessionError> {
        self.update(|data| data.last_result_id = Some(id.to_string()))
    }

    pub fn language(&self) -> Option<String> {
        self.channel.borrow().language.clone()
    }

    pub fn set_language(&self, language: &str) -> Result<(), SessionError> {
        self.update(|data| data.language = Some(language.to_string()))
    }

    fn update(&self, mutate: impl FnOnce(&mut SessionData)) -> Result<(), SessionError> {
        let mut next = self.snapshot();
        mutate(&mut next);
        self.backend.persist(&next)?;
        self.channel.send_replace(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn file_store(dir: &tempfile::TempDir) -> SessionStore {
        let backend = FileBackend::new(dir.path().join("session.json"));
        SessionStore::open(Arc::new(backend)).unwrap()
    }

    #[test]
    fn test_fresh_store_is_unauthenticated() {
        let store = SessionStore::in_memory();
        assert!(!store.is_authenticated());
        assert_eq!(store.access_token(), None);
    }

    #[test]
    fn test_token_pair_roundtrip_through_file() {
        let dir = tempdir().unwrap();

        let store = file_store(&dir);
        store.set_token_pair("access-1", "refresh-1").unwrap();
        store.set_last_cv_id("cv-9").unwrap();

        // A second store over the same path sees the persisted state.
        let reopened = file_store(&dir);
        assert!(reopened.is_authenticated());
        assert_eq!(reopened.access_token().as_deref(), Some("access-1"));
        assert_eq!(reopened.refresh_token().as_deref(), Some("refresh-1"));
        assert_eq!(reopened.last_cv_id().as_deref(), Some("cv-9"));
    }

    #[test]
    fn test_clear_tokens_keeps_cached_ids() {
        let store = SessionStore::in_memory();
        store.set_token_pair("a", "r").unwrap();
        store.set_last_cv_id("cv-1").unwrap();

        store.clear_tokens().unwrap();
        assert!(!store.is_authenticated());
        assert_eq!(store.refresh_token(), None);
        assert_eq!(store.last_cv_id().as_deref(), Some("cv-1"));
    }

    #[test]
    fn test_corrupt_session_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = SessionStore::open(Arc::new(FileBackend::new(path))).unwrap();
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let dir = tempdir().unwrap();
        let store = file_store(&dir);
        store.set_token_pair("a", "r").unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_observe_updates() {
        let store = SessionStore::in_memory();
        let mut rx = store.subscribe();

        store.set_token_pair("access-2", "refresh-2").unwrap();

        rx.changed().await.unwrap();
        let seen = rx.borrow().clone();
        assert_eq!(seen.access_token.as_deref(), Some("access-2"));
        assert_eq!(seen.refresh_token.as_deref(), Some("refresh-2"));
    }

    #[tokio::test]
    async fn test_logout_broadcasts_change() {
        let store = SessionStore::in_memory();
        store.set_token_pair("a", "r").unwrap();

        let mut rx = store.subscribe();
        store.clear_tokens().unwrap();

        rx.changed().await.unwrap();
        assert!(rx.borrow().access_token.is_none());
    }

    /// A backend that fails every persist, for atomicity checks.
    struct FailingBackend;

    impl SessionBackend for FailingBackend {
        fn load(&self) -> Result<Option<SessionData>, SessionError> {
            Ok(None)
        }
        fn persist(&self, _data: &SessionData) -> Result<(), SessionError> {
            Err(SessionError::NoStateDir)
        }
    }

    #[test]
    fn test_failed_persist_leaves_memory_unchanged() {
        let store = SessionStore::open(Arc::new(FailingBackend)).unwrap();

        assert!(store.set_token_pair("a", "r").is_err());
        // Neither token is visible: the pair is all-or-nothing.
        assert_eq!(store.access_token(), None);
        assert_eq!(store.refresh_token(), None);
    }
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Everything written on login and erased on logout.
///
/// The auxiliary identifiers scope API calls to a company/employee and share
/// the token's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub token: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub employee_name: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            role: None,
            company_id: None,
            employee_id: None,
            employee_name: None,
            created_at: Utc::now(),
        }
    }
}

/// Process-wide holder of the current session.
///
/// Every method must be safe to call repeatedly; `clear_session` on an empty
/// store is a no-op.
pub trait SessionStore: Send + Sync {
    fn session(&self) -> Option<SessionData>;

    fn set_session(&self, data: SessionData) -> Result<()>;

    fn clear_session(&self) -> Result<()>;

    /// Get the bearer token, if any
    fn token(&self) -> Option<String> {
        self.session().map(|s| s.token)
    }
}

/// In-memory store, for tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    data: RwLock<Option<SessionData>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(data: SessionData) -> Self {
        Self {
            data: RwLock::new(Some(data)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn session(&self) -> Option<SessionData> {
        self.data.read().clone()
    }

    fn set_session(&self, data: SessionData) -> Result<()> {
        *self.data.write() = Some(data);
        Ok(())
    }

    fn clear_session(&self) -> Result<()> {
        self.data.write().take();
        Ok(())
    }
}

/// Store backed by `session.json` in the cache directory.
///
/// The file is read once on construction and kept in memory afterwards.
pub struct FileSessionStore {
    cache_dir: PathBuf,
    data: RwLock<Option<SessionData>>,
}

impl FileSessionStore {
    /// Open the store, loading any session already on disk
    pub fn open(cache_dir: PathBuf) -> Result<Self> {
        let store = Self {
            cache_dir,
            data: RwLock::new(None),
        };
        let loaded = store.load()?;
        *store.data.write() = loaded;
        Ok(store)
    }

    fn load(&self) -> Result<Option<SessionData>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        match serde_json::from_str::<SessionData>(&contents) {
            Ok(data) => {
                debug!(path = %path.display(), "Loaded session from disk");
                Ok(Some(data))
            }
            Err(e) => {
                // An unreadable session is no session
                warn!(error = %e, path = %path.display(), "Discarding unreadable session file");
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(error = %e, "Failed to remove unreadable session file");
                }
                Ok(None)
            }
        }
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

impl SessionStore for FileSessionStore {
    fn session(&self) -> Option<SessionData> {
        self.data.read().clone()
    }

    fn set_session(&self, data: SessionData) -> Result<()> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create session directory")?;
        }
        let contents = serde_json::to_string_pretty(&data)?;
        std::fs::write(&path, contents).context("Failed to write session file")?;

        *self.data.write() = Some(data);
        Ok(())
    }

    fn clear_session(&self) -> Result<()> {
        // Drop the in-memory copy first so a failed unlink still logs out
        self.data.write().take();

        let path = self.session_path();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove session file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SessionData {
        SessionData {
            token: "a.b.c".to_string(),
            role: Some("admin".to_string()),
            company_id: Some("17".to_string()),
            employee_id: Some("E-204".to_string()),
            employee_name: Some("Dana Ruiz".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_memory_store_lifecycle() {
        let store = MemorySessionStore::new();
        assert!(store.token().is_none());

        store.set_session(sample()).unwrap();
        assert_eq!(store.token().as_deref(), Some("a.b.c"));
        assert_eq!(store.session().unwrap().company_id.as_deref(), Some("17"));

        store.clear_session().unwrap();
        assert!(store.session().is_none());

        // Clearing twice is harmless
        store.clear_session().unwrap();
        assert!(store.token().is_none());
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileSessionStore::open(dir.path().to_path_buf()).unwrap();
        assert!(store.session().is_none());
        let data = sample();
        store.set_session(data.clone()).unwrap();

        let reopened = FileSessionStore::open(dir.path().to_path_buf()).unwrap();
        assert_eq!(reopened.session(), Some(data));
        assert_eq!(reopened.token().as_deref(), Some("a.b.c"));
    }

    #[test]
    fn test_file_store_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::open(dir.path().join("nested")).unwrap();
        store.set_session(sample()).unwrap();
        assert!(dir.path().join("nested").join(SESSION_FILE).exists());

        store.clear_session().unwrap();
        store.clear_session().unwrap();
        assert!(!dir.path().join("nested").join(SESSION_FILE).exists());
        assert!(store.session().is_none());
    }

    #[test]
    fn test_session_file_uses_camel_case_keys() {
        let json = serde_json::to_value(sample()).unwrap();
        for key in ["token", "role", "companyId", "employeeId", "employeeName"] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
    }

    #[test]
    fn test_corrupt_session_file_starts_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE);
        std::fs::write(&path, "{ nope").unwrap();

        let store = FileSessionStore::open(dir.path().to_path_buf()).unwrap();
        assert!(store.session().is_none());
        assert!(store.token().is_none());
        assert!(!path.exists());

        // A fresh login still works afterwards
        let data = sample();
        store.set_session(data.clone()).unwrap();
        let reopened = FileSessionStore::open(dir.path().to_path_buf()).unwrap();
        assert_eq!(reopened.session(), Some(data));
    }
}

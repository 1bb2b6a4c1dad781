//! Persistent session store: a single key/value record shared by every
//! context, read with `get(keys)` and written with partial `set`s.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;
use vigil_common::session::{SessionKey, SessionPatch};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access session store: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt session record: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The requested keys that are present in the record.
    async fn get(&self, keys: &[SessionKey]) -> Result<SessionPatch, StoreError>;

    /// Merge the present fields of `patch` into the record.
    async fn set(&self, patch: SessionPatch) -> Result<(), StoreError>;

    async fn get_all(&self) -> Result<SessionPatch, StoreError> {
        self.get(&SessionKey::ALL).await
    }
}

/// In-process store. Clones share the same record.
#[derive(Clone, Default)]
pub struct MemoryStore {
    record: Arc<Mutex<SessionPatch>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: SessionPatch) -> Self {
        Self {
            record: Arc::new(Mutex::new(record)),
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, keys: &[SessionKey]) -> Result<SessionPatch, StoreError> {
        Ok(self.record.lock().await.select(keys))
    }

    async fn set(&self, patch: SessionPatch) -> Result<(), StoreError> {
        self.record.lock().await.merge(patch);
        Ok(())
    }
}

/// JSON document on disk; survives restarts. A missing file is an empty record.
#[derive(Clone)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// `~/.vigil/session.json`, or `./vigil-session.json` without a home dir.
    pub fn default_path() -> PathBuf {
        match dirs::home_dir() {
            Some(home) => home.join(".vigil").join("session.json"),
            None => PathBuf::from("./vigil-session.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_record(&self) -> Result<SessionPatch, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(SessionPatch::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SessionPatch::default()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn get(&self, keys: &[SessionKey]) -> Result<SessionPatch, StoreError> {
        Ok(self.read_record().await?.select(keys))
    }

    async fn set(&self, patch: SessionPatch) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.read_record().await?;
        record.merge(patch);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(&record)?;
        tokio::fs::write(&self.path, json).await?;
        debug!("Session record written to {}", self.path.display());
        Ok(())
    }
}

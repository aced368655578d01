// src/session/checkpoint.rs

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::StorageError,
    models::{
        answer::AnswerMap,
        session::{SessionIdentity, SessionStatus},
    },
};

/// Bumped whenever the checkpoint layout changes. Payloads carrying another
/// version are discarded on load.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Latest-wins snapshot of everything needed to resume an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub version: u32,
    pub answers: AnswerMap,
    pub time_left: u32,
    pub status: SessionStatus,
    pub session_start: Option<DateTime<Utc>>,
    pub pointer: usize,
    pub saved_at: DateTime<Utc>,
}

/// Synchronous string key-value store that survives a reload.
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // Keys are opaque; encode them so they can never escape `dir`.
    fn path_for(&self, key: &str) -> PathBuf {
        let encoded: String = url::form_urlencoded::byte_serialize(key.as_bytes()).collect();
        self.dir.join(format!("{}.json", encoded))
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let final_path = self.path_for(key);
        let tmp_path = final_path.with_extension("json.tmp");

        fs::write(&tmp_path, value)?;
        match fs::rename(&tmp_path, &final_path) {
            Ok(()) => Ok(()),
            Err(rename_err) => {
                if final_path.exists() {
                    fs::remove_file(&final_path)?;
                    fs::rename(&tmp_path, &final_path)?;
                    Ok(())
                } else {
                    Err(rename_err.into())
                }
            }
        }
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-process store. Counts writes and can be switched unavailable to
/// emulate a full or disabled storage area.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful `set_item` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("storage disabled".to_string()));
        }
        Ok(())
    }

    fn items(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.items
            .lock()
            .map_err(|_| StorageError::Unavailable("store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_available()?;
        Ok(self.items()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_available()?;
        self.items()?.insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.check_available()?;
        self.items()?.remove(key);
        Ok(())
    }
}

/// Best-effort checkpoint register for one exam attempt.
///
/// None of the operations fail towards the caller: storage trouble is logged
/// and the live session keeps going without local durability.
#[derive(Clone)]
pub struct LocalCheckpoint {
    store: Arc<dyn KeyValueStore>,
    identity: SessionIdentity,
    key: String,
}

impl LocalCheckpoint {
    pub fn new(store: Arc<dyn KeyValueStore>, identity: SessionIdentity) -> Self {
        let key = identity.storage_key();
        Self {
            store,
            identity,
            key,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn save(&self, checkpoint: &Checkpoint) {
        let payload = match serde_json::to_string(checkpoint) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Failed to encode checkpoint for {}: {}", self.identity, e);
                return;
            }
        };

        if let Err(e) = self.store.set_item(&self.key, &payload) {
            tracing::warn!("Checkpoint write for {} skipped: {}", self.identity, e);
        }
    }

    /// Last written checkpoint. Missing, unreadable, malformed or
    /// other-version payloads all come back as `None`.
    pub fn load(&self) -> Option<Checkpoint> {
        let raw = match self.store.get_item(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Checkpoint read for {} failed: {}", self.identity, e);
                return None;
            }
        };

        let checkpoint: Checkpoint = match serde_json::from_str(&raw) {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                tracing::warn!("Discarding corrupt checkpoint for {}: {}", self.identity, e);
                return None;
            }
        };

        if checkpoint.version != CHECKPOINT_VERSION {
            tracing::warn!(
                "Discarding checkpoint for {} with version {} (expected {})",
                self.identity,
                checkpoint.version,
                CHECKPOINT_VERSION
            );
            return None;
        }

        Some(checkpoint)
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.remove_item(&self.key) {
            tracing::warn!("Checkpoint removal for {} failed: {}", self.identity, e);
        }
    }
}

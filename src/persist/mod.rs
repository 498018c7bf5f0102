//! Timer and slot persistence
//!
//! One snapshot per manor, loaded when the manor is registered and written
//! at shutdown and whenever a timer is consumed.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::manor::timers::{Slot, Timer};

/// Saved scheduling state of one manor
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ManorSnapshot {
    #[serde(default)]
    pub timers: Vec<Timer>,
    #[serde(default)]
    pub slots: Vec<Slot>,
    /// Unix time of the save
    #[serde(default)]
    pub saved_at: f64,
}

/// Storage for manor snapshots
pub trait Persistence {
    fn load(&self, manor_id: &str) -> Result<Option<ManorSnapshot>, PersistError>;

    fn save(&mut self, manor_id: &str, snapshot: &ManorSnapshot) -> Result<(), PersistError>;
}

/// `<dir>/<manor_id>.json` per manor
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, manor_id: &str) -> PathBuf {
        let safe: String = manor_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

impl Persistence for JsonFileStore {
    fn load(&self, manor_id: &str) -> Result<Option<ManorSnapshot>, PersistError> {
        let path = self.path_for(manor_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)?;
        let snapshot = serde_json::from_str(&data)?;
        log::debug!("[{}] loaded snapshot from {}", manor_id, path.display());
        Ok(Some(snapshot))
    }

    fn save(&mut self, manor_id: &str, snapshot: &ManorSnapshot) -> Result<(), PersistError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(manor_id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(snapshot)?)?;
        fs::rename(&tmp, &path)?;
        log::debug!("[{}] saved snapshot to {}", manor_id, path.display());
        Ok(())
    }
}

/// In-memory store; clones share their contents
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    snapshots: Arc<Mutex<HashMap<String, ManorSnapshot>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, manor_id: &str) -> Option<ManorSnapshot> {
        self.snapshots
            .lock()
            .ok()
            .and_then(|map| map.get(manor_id).cloned())
    }
}

impl Persistence for MemoryStore {
    fn load(&self, manor_id: &str) -> Result<Option<ManorSnapshot>, PersistError> {
        let map = self.snapshots.lock().map_err(|_| PersistError::Poisoned)?;
        Ok(map.get(manor_id).cloned())
    }

    fn save(&mut self, manor_id: &str, snapshot: &ManorSnapshot) -> Result<(), PersistError> {
        let mut map = self.snapshots.lock().map_err(|_| PersistError::Poisoned)?;
        map.insert(manor_id.to_string(), snapshot.clone());
        Ok(())
    }
}

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Store lock poisoned")]
    Poisoned,
}

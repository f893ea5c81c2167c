//! Durable key-value state
//!
//! The updater keeps a handful of values across process restarts: the active
//! phase, the last progress, whether an update was underway, the changelog,
//! the active update record and the early-updates opt-in.
//!
//! Writes are last-writer-wins and best effort. A failed write is logged and
//! never blocks a transition from completing in memory.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::phase::PhaseId;
use crate::record::UpdateRecord;

/// Keys of the persisted state
pub mod keys {
    pub const PAGE_ID: &str = "pageId";
    pub const PROG_PERCENT: &str = "progPercent";
    pub const PROG_STEP: &str = "progStep";
    pub const UPDATING: &str = "updating";
    pub const UPDATE: &str = "update";
    pub const CHANGELOG: &str = "changelog";
    pub const EARLY_UPDATES: &str = "earlyUpdates";
    pub const LAST_UPDATE_CHECK: &str = "lastUpdateCheck";
}

/// Backing storage for [`PersistedState`]
pub trait StateStore: Send {
    fn get(&self, key: &str) -> Option<Value>;
    fn put(&mut self, key: &str, value: Value) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
    /// Make every accepted write durable
    fn flush(&mut self) -> Result<()>;
}

/// Store that lives only as long as the process
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.values.clear();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// JSON file store, written through on every change
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, Value>,
}

impl FileStore {
    /// Open the store at `path`, loading existing values if the file exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let json = std::fs::read_to_string(&path)?;
            if json.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&json)?
            }
        } else {
            debug!(path = %path.display(), "No state file yet (this is normal on first run)");
            BTreeMap::new()
        };

        info!(path = %path.display(), keys = values.len(), "State store opened");
        Ok(Self { path, values })
    }

    fn save_to_disk(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&self.values)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        self.save_to_disk()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.save_to_disk()?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.values.clear();
        self.save_to_disk()
    }

    fn flush(&mut self) -> Result<()> {
        self.save_to_disk()?;
        debug!(path = %self.path.display(), "State store flushed");
        Ok(())
    }
}

/// Early-updates opt-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EarlyUpdates {
    #[default]
    Unset,
    Accepted,
    Rejected,
}

/// Typed view over the persisted keys
pub struct PersistedState {
    store: Box<dyn StateStore>,
}

impl PersistedState {
    pub fn new(store: Box<dyn StateStore>) -> Self {
        Self { store }
    }

    /// In-memory state, mostly for tests and dry runs
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    fn write(&mut self, key: &str, value: Value) {
        if let Err(e) = self.store.put(key, value) {
            warn!(key = key, error = %e, "Failed to persist value");
        }
    }

    fn erase(&mut self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            warn!(key = key, error = %e, "Failed to remove persisted value");
        }
    }

    fn read_string(&self, key: &str) -> String {
        match self.store.get(key) {
            Some(Value::String(s)) => s,
            _ => String::new(),
        }
    }

    /// Stored phase id, empty when none
    pub fn page_id(&self) -> String {
        self.read_string(keys::PAGE_ID)
    }

    /// Persist the active phase. Transient phases are skipped.
    pub fn set_page_id(&mut self, phase: PhaseId) {
        if phase.is_transient() {
            return;
        }
        self.write(keys::PAGE_ID, Value::from(phase.as_str()));
    }

    pub fn clear_page_id(&mut self) {
        self.write(keys::PAGE_ID, Value::from(""));
    }

    pub fn progress_percent(&self) -> i32 {
        self.store
            .get(keys::PROG_PERCENT)
            .and_then(|v| v.as_i64())
            .map(|v| v.clamp(-1, 100) as i32)
            .unwrap_or(0)
    }

    pub fn progress_step(&self) -> String {
        self.read_string(keys::PROG_STEP)
    }

    pub fn set_progress(&mut self, percent: i32, step: &str) {
        self.write(keys::PROG_PERCENT, Value::from(percent));
        self.write(keys::PROG_STEP, Value::from(step));
    }

    pub fn reset_progress(&mut self) {
        self.set_progress(0, "");
    }

    pub fn was_updating(&self) -> bool {
        self.store
            .get(keys::UPDATING)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn set_updating(&mut self, updating: bool) {
        self.write(keys::UPDATING, Value::from(updating));
    }

    pub fn changelog(&self) -> String {
        self.read_string(keys::CHANGELOG)
    }

    pub fn set_changelog(&mut self, html: &str) {
        self.write(keys::CHANGELOG, Value::from(html));
    }

    /// Restore the saved update record. A corrupt value is logged and ignored.
    pub fn update_record(&self) -> Option<UpdateRecord> {
        let encoded = self.read_string(keys::UPDATE);
        if encoded.is_empty() {
            return None;
        }
        match UpdateRecord::decode(&encoded) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "Failed to load saved update from state");
                None
            }
        }
    }

    pub fn set_update_record(&mut self, record: &UpdateRecord) {
        match record.encode() {
            Ok(encoded) => self.write(keys::UPDATE, Value::from(encoded)),
            Err(e) => warn!(download_id = %record.download_id, error = %e, "Failed to encode update"),
        }
    }

    pub fn clear_update_record(&mut self) {
        self.erase(keys::UPDATE);
    }

    pub fn early_updates(&self) -> EarlyUpdates {
        match self.store.get(keys::EARLY_UPDATES).and_then(|v| v.as_i64()) {
            Some(v) if v > 0 => EarlyUpdates::Accepted,
            Some(_) => EarlyUpdates::Rejected,
            None => EarlyUpdates::Unset,
        }
    }

    pub fn set_early_updates(&mut self, accepted: bool) {
        self.write(keys::EARLY_UPDATES, Value::from(if accepted { 1 } else { 0 }));
    }

    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        let raw = self.read_string(keys::LAST_UPDATE_CHECK);
        DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn set_last_check(&mut self, at: DateTime<Utc>) {
        self.write(keys::LAST_UPDATE_CHECK, Value::from(at.to_rfc3339()));
    }

    /// Forget the in-progress session (phase, progress, updating flag)
    /// while keeping the record, changelog and opt-in.
    pub fn clear_session(&mut self) {
        self.clear_page_id();
        self.reset_progress();
        self.set_updating(false);
    }

    /// Drop every persisted value
    pub fn clear_all(&mut self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted state");
        }
    }

    pub fn flush(&mut self) {
        if let Err(e) = self.store.flush() {
            warn!(error = %e, "Failed to flush persisted state");
        }
    }

    /// Raw value, for inspection tools
    pub fn raw(&self, key: &str) -> Option<Value> {
        self.store.get(key)
    }
}

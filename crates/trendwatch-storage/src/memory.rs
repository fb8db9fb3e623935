use crate::error::{Result, StorageError};
use crate::store::{LoadedStore, NotificationStore};
use crate::NotificationStateStore;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Keeps the serialized document in memory. Used by tests.
#[derive(Default)]
pub struct MemoryStateStore {
    document: Mutex<Option<String>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save fail until switched back.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// The last successfully saved document.
    pub fn document(&self) -> Option<String> {
        self.document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl NotificationStateStore for MemoryStateStore {
    fn load(&self, now: DateTime<Utc>) -> LoadedStore {
        let Some(document) = self.document() else {
            return LoadedStore::empty(now);
        };
        NotificationStore::from_json(&document, now).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to parse in-memory notification state");
            LoadedStore::empty(now)
        })
    }

    fn save(&self, store: &NotificationStore) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Other("in-memory store rejected save".to_string()));
        }
        let json = store.to_json_pretty()?;
        *self
            .document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(json);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

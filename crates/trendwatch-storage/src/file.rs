use crate::error::{Result, StorageError};
use crate::store::{LoadedStore, NotificationStore};
use crate::NotificationStateStore;
use chrono::{DateTime, Utc};
use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

/// Notification state kept in a single pretty-printed JSON document.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Sibling written before the rename. Always differs from `path`, even
    /// when `path` itself ends in `.tmp`.
    pub(crate) fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn io_err(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn write_temp(&self, temp_path: &PathBuf, json: &str) -> Result<()> {
        let mut file = std::fs::File::create(temp_path).map_err(|e| self.io_err(e))?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| self.io_err(e))
    }
}

impl NotificationStateStore for JsonFileStore {
    fn load(&self, now: DateTime<Utc>) -> LoadedStore {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    path = %self.path.display(),
                    "No notification state file, starting empty"
                );
                return LoadedStore::empty(now);
            }
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read notification state, starting empty"
                );
                return LoadedStore::empty(now);
            }
        };

        match NotificationStore::from_json(&content, now) {
            Ok(loaded) => {
                tracing::info!(
                    path = %self.path.display(),
                    short = loaded.store.short_window.len(),
                    long = loaded.store.long_window.len(),
                    reset_defaulted = loaded.reset_defaulted,
                    "Loaded notification state"
                );
                loaded
            }
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to parse notification state, starting empty"
                );
                LoadedStore::empty(now)
            }
        }
    }

    fn save(&self, store: &NotificationStore) -> Result<()> {
        let json = store.to_json_pretty()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
            }
        }

        // Readers only ever see the old or the new document.
        let temp_path = self.temp_path();
        if let Err(e) = self.write_temp(&temp_path, &json) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }
        if let Err(e) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(self.io_err(e));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

//! Durable notification state for the alert decision engine.
//!
//! The state is a [`store::NotificationStore`]: two buckets (short and long
//! window) mapping keyword to the volume at which it was last notified,
//! plus the timestamp of the last retention reset. Backends implement
//! [`NotificationStateStore`].

pub mod error;
pub mod file;
pub mod memory;
pub mod store;


pub use file::JsonFileStore;
pub use memory::MemoryStateStore;
pub use store::{LoadedStore, NotificationStore};

use chrono::{DateTime, Utc};

/// Persistence backend for [`NotificationStore`].
pub trait NotificationStateStore: Send + Sync {
    /// Reads the persisted store. Never fails: any read or parse problem is
    /// logged and an empty store stamped with `now` is returned.
    fn load(&self, now: DateTime<Utc>) -> LoadedStore;

    /// Writes the full store, replacing the previous version atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails; the previously
    /// persisted version is left intact.
    fn save(&self, store: &NotificationStore) -> error::Result<()>;

    /// Short description for logs and the status API (e.g. `file:state.json`).
    fn describe(&self) -> String;
}

impl<T: NotificationStateStore + ?Sized> NotificationStateStore for std::sync::Arc<T> {
    fn load(&self, now: DateTime<Utc>) -> LoadedStore {
        (**self).load(now)
    }

    fn save(&self, store: &NotificationStore) -> error::Result<()> {
        (**self).save(store)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

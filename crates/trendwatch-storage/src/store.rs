use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trendwatch_common::types::Timeframe;
use utoipa::ToSchema;

/// Last-notified volume per keyword, for both buckets.
///
/// Ordered maps keep the serialized form deterministic, so an unchanged
/// store always produces identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct NotificationStore {
    pub short_window: BTreeMap<String, u64>,
    pub long_window: BTreeMap<String, u64>,
    pub last_reset_at: DateTime<Utc>,
}

/// On-disk shape. Buckets may be missing and the legacy `4h`/`24h` names
/// are accepted.
#[derive(Debug, Deserialize)]
pub(crate) struct StoreDocument {
    #[serde(default, alias = "4h")]
    short_window: BTreeMap<String, u64>,
    #[serde(default, alias = "24h")]
    long_window: BTreeMap<String, u64>,
    #[serde(default)]
    last_reset_at: Option<DateTime<Utc>>,
}

impl StoreDocument {
    pub(crate) fn into_loaded(self, now: DateTime<Utc>) -> LoadedStore {
        let reset_defaulted = self.last_reset_at.is_none();
        LoadedStore {
            store: NotificationStore {
                short_window: self.short_window,
                long_window: self.long_window,
                last_reset_at: self.last_reset_at.unwrap_or(now),
            },
            reset_defaulted,
        }
    }
}

/// Result of reading a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedStore {
    pub store: NotificationStore,
    /// A document was read but carried no `last_reset_at`, so the load time
    /// was used. The stamp exists only in memory until the store is saved.
    pub reset_defaulted: bool,
}

impl LoadedStore {
    /// A fresh empty store; nothing on disk needs rewriting.
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            store: NotificationStore::empty(now),
            reset_defaulted: false,
        }
    }
}

impl NotificationStore {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            short_window: BTreeMap::new(),
            long_window: BTreeMap::new(),
            last_reset_at: now,
        }
    }

    pub fn bucket(&self, timeframe: Timeframe) -> &BTreeMap<String, u64> {
        match timeframe {
            Timeframe::Short => &self.short_window,
            Timeframe::Long => &self.long_window,
        }
    }

    pub fn bucket_mut(&mut self, timeframe: Timeframe) -> &mut BTreeMap<String, u64> {
        match timeframe {
            Timeframe::Short => &mut self.short_window,
            Timeframe::Long => &mut self.long_window,
        }
    }

    pub fn last_notified(&self, timeframe: Timeframe, keyword: &str) -> Option<u64> {
        self.bucket(timeframe).get(keyword).copied()
    }

    /// Record the volume at which a notification was just sent.
    pub fn record(&mut self, timeframe: Timeframe, keyword: &str, volume: u64) {
        self.bucket_mut(timeframe).insert(keyword.to_string(), volume);
    }

    /// Drop both buckets and restart the retention window at `now`.
    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.short_window.clear();
        self.long_window.clear();
        self.last_reset_at = now;
    }

    pub fn len(&self) -> usize {
        self.short_window.len() + self.long_window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.short_window.is_empty() && self.long_window.is_empty()
    }

    pub fn to_json_pretty(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str, now: DateTime<Utc>) -> crate::error::Result<LoadedStore> {
        let doc: StoreDocument = serde_json::from_str(content)?;
        Ok(doc.into_loaded(now))
    }
}

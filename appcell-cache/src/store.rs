//! The local cache proper.

use crate::entry::CacheEntry;
use crate::error::CacheResult;
use appcell_types::{AppBundle, DocumentId, Manifest, ParamMap, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Default bound on the app bundle table.
pub const DEFAULT_APP_CAPACITY: usize = 4;

/// Eviction order key: cache time, with a monotonic sequence number breaking
/// ties deterministically in insertion order.
type OrderKey = (Timestamp, u64);

#[derive(Debug)]
struct AppSlot {
    entry: CacheEntry<AppBundle>,
    order_key: OrderKey,
}

/// Bounded local cache for app bundles plus an unbounded key/value sub-cache.
///
/// Reads are pure lookups and never touch `cached_at`; recency is stamped
/// only on `put`. Eviction removes the entry with the smallest
/// `(cached_at, insertion_seq)` key, which picks the same victim as sorting
/// all entries by cache time but costs O(log n) per insert.
#[derive(Debug)]
pub struct LocalCache {
    path: Option<PathBuf>,
    capacity: usize,
    apps: HashMap<DocumentId, AppSlot>,
    order: BTreeMap<OrderKey, DocumentId>,
    next_seq: u64,
    values: HashMap<String, CacheEntry<serde_json::Value>>,
}

impl LocalCache {
    /// Opens a cache backed by the given file.
    ///
    /// A missing, unreadable, or corrupt file yields an empty cache: the
    /// cache is an optimization, so it fails open rather than blocking the
    /// application.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let mut cache = Self {
            path: Some(path.clone()),
            capacity,
            apps: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            values: HashMap::new(),
        };

        match Self::load_persisted(&path) {
            Ok(Some(persisted)) => cache.restore(persisted),
            Ok(None) => {}
            Err(err) => {
                debug!("discarding unreadable cache file {}: {err}", path.display());
            }
        }

        cache
    }

    /// Creates a cache with no durable backing (tests, private sessions).
    #[must_use]
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            path: None,
            capacity,
            apps: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            values: HashMap::new(),
        }
    }

    /// Returns the app table bound.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of cached app bundles.
    #[must_use]
    pub fn app_len(&self) -> usize {
        self.apps.len()
    }

    /// Pure lookup of a cached bundle. Does not update recency.
    #[must_use]
    pub fn get_app(&self, id: &DocumentId) -> Option<&CacheEntry<AppBundle>> {
        self.apps.get(id).map(|slot| &slot.entry)
    }

    /// Caches a bundle stamped at the current time, evicting the
    /// least-recently-cached entry if the table is over capacity.
    pub fn put_app(&mut self, bundle: AppBundle) {
        self.put_app_at(bundle, Timestamp::now());
    }

    /// Caches a bundle with an explicit cache time. Used when restoring
    /// persisted entries, where the original `cached_at` must survive.
    pub fn put_app_at(&mut self, bundle: AppBundle, cached_at: Timestamp) {
        self.insert_app_slot(bundle, cached_at);
        self.evict_over_capacity();
        self.persist_or_warn();
    }

    /// Drops a bundle from the cache so the next load re-fetches.
    pub fn invalidate_app(&mut self, id: &DocumentId) {
        if let Some(slot) = self.apps.remove(id) {
            self.order.remove(&slot.order_key);
            self.persist_or_warn();
        }
    }

    /// Pure lookup in the generic sub-cache.
    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<&CacheEntry<serde_json::Value>> {
        self.values.get(key)
    }

    /// Deserializing lookup in the generic sub-cache.
    ///
    /// An entry that no longer matches the expected shape is treated as a
    /// miss, not an error.
    #[must_use]
    pub fn get_typed<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let entry = self.values.get(key)?;
        match serde_json::from_value(entry.value.clone()) {
            Ok(value) => Some(CacheEntry::new(value, entry.cached_at)),
            Err(err) => {
                debug!("cached value under {key} no longer parses, treating as miss: {err}");
                None
            }
        }
    }

    /// Caches a value stamped at the current time. The generic sub-cache is
    /// never evicted by size.
    pub fn put_value(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.put_value_at(key, value, Timestamp::now());
    }

    /// Caches a value with an explicit cache time.
    pub fn put_value_at(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
        cached_at: Timestamp,
    ) {
        self.values
            .insert(key.into(), CacheEntry::new(value, cached_at));
        self.persist_or_warn();
    }

    /// Serializing variant of [`put_value`](Self::put_value).
    pub fn put_typed<T: Serialize>(&mut self, key: impl Into<String>, value: &T) {
        self.put_typed_at(key, value, Timestamp::now());
    }

    /// Serializing variant of [`put_value_at`](Self::put_value_at).
    pub fn put_typed_at<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
        cached_at: Timestamp,
    ) {
        match serde_json::to_value(value) {
            Ok(json) => self.put_value_at(key, json, cached_at),
            Err(err) => warn!("failed to serialize cache value, skipping: {err}"),
        }
    }

    /// Drops a single generic entry.
    pub fn invalidate_value(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.persist_or_warn();
        }
    }

    /// Drops every generic entry whose key starts with `prefix`. Used for
    /// cascading invalidation when an app and its sub-resources are removed.
    pub fn invalidate_prefix(&mut self, prefix: &str) {
        let before = self.values.len();
        self.values.retain(|key, _| !key.starts_with(prefix));
        if self.values.len() != before {
            self.persist_or_warn();
        }
    }

    fn insert_app_slot(&mut self, bundle: AppBundle, cached_at: Timestamp) {
        let id = bundle.id.clone();
        if let Some(old) = self.apps.remove(&id) {
            self.order.remove(&old.order_key);
        }
        let order_key = (cached_at, self.next_seq);
        self.next_seq += 1;
        self.order.insert(order_key, id.clone());
        self.apps.insert(
            id,
            AppSlot {
                entry: CacheEntry::new(bundle, cached_at),
                order_key,
            },
        );
    }

    fn evict_over_capacity(&mut self) {
        while self.apps.len() > self.capacity {
            let Some((_, id)) = self.order.pop_first() else {
                break;
            };
            debug!("evicting least-recently-cached bundle {id}");
            self.apps.remove(&id);
        }
    }

    fn restore(&mut self, persisted: PersistedCache) {
        // Re-insert bundles in ascending cache time so the tie-break
        // sequence preserves the on-disk ordering.
        let mut apps: Vec<_> = persisted.apps.into_iter().collect();
        apps.sort_by_key(|(_, app)| app.cached_at);
        for (id, app) in apps {
            let cached_at = app.cached_at;
            self.insert_app_slot(app.into_bundle(DocumentId::new(id)), cached_at);
        }
        self.evict_over_capacity();

        for (key, entry) in persisted.values {
            self.values.insert(key, entry);
        }
    }

    fn load_persisted(path: &PathBuf) -> CacheResult<Option<PersistedCache>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Persists the whole cache. Failures must never fail the caller's
    /// operation (the fetch or save already succeeded against the remote
    /// store), so they are logged and swallowed.
    fn persist_or_warn(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(err) = self.persist(path) {
            warn!("cache persistence failed, continuing: {err}");
        }
    }

    fn persist(&self, path: &PathBuf) -> CacheResult<()> {
        let persisted = PersistedCache {
            apps: self
                .apps
                .iter()
                .map(|(id, slot)| (id.to_string(), PersistedApp::from_entry(&slot.entry)))
                .collect(),
            values: self
                .values
                .iter()
                .map(|(key, entry)| (key.clone(), entry.clone()))
                .collect(),
        };
        std::fs::write(path, serde_json::to_string(&persisted)?)?;
        Ok(())
    }
}

/// On-disk layout: one mapping keyed by app id, one per generic cache key.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedCache {
    #[serde(default)]
    apps: BTreeMap<String, PersistedApp>,
    #[serde(default)]
    values: BTreeMap<String, CacheEntry<serde_json::Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedApp {
    manifest: Manifest,
    #[serde(default)]
    params: ParamMap,
    html: String,
    #[serde(rename = "cachedAt")]
    cached_at: Timestamp,
}

impl PersistedApp {
    fn from_entry(entry: &CacheEntry<AppBundle>) -> Self {
        Self {
            manifest: entry.value.manifest.clone(),
            params: entry.value.params.clone(),
            html: entry.value.html.clone(),
            cached_at: entry.cached_at,
        }
    }

    fn into_bundle(self, id: DocumentId) -> AppBundle {
        AppBundle {
            id,
            manifest: self.manifest,
            params: self.params,
            html: self.html,
        }
    }
}

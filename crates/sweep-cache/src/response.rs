use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sweep_models::cache_schema::{CacheEntry, CacheNamespace};
use tracing::{debug, warn};

use crate::store::KeyValueStore;

/// TTL-bounded cache of fetched payloads, split into namespaces.
///
/// Store failures never reach callers: reads degrade to a miss and writes
/// become no-ops, each logged at `warn`. An entry is valid while
/// `now - stored_at < ttl`. Reading an expired entry evicts it, unless a
/// concurrent writer has already replaced it.
pub struct ResponseCache {
    store: Option<Arc<dyn KeyValueStore>>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self {
            store: Some(store),
            ttl,
        }
    }

    /// A cache with no backing store. Every read misses.
    pub fn unavailable(ttl: Duration) -> Self {
        Self { store: None, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_available(&self) -> bool {
        self.store.is_some()
    }

    /// Fresh payload for `(namespace, key)`, if any.
    pub async fn get(&self, namespace: CacheNamespace, key: Option<&str>) -> Option<Value> {
        let store = self.store.as_ref()?;
        let full_key = namespace.key(key);

        let raw = match store.get(&full_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %full_key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %full_key, error = %e, "Discarding unreadable cache entry");
                self.evict(store.as_ref(), &full_key, &raw).await;
                return None;
            }
        };

        if !entry.is_fresh(self.ttl, Utc::now()) {
            debug!(key = %full_key, stored_at = %entry.stored_at, "Cache entry expired");
            self.evict(store.as_ref(), &full_key, &raw).await;
            return None;
        }

        Some(entry.payload)
    }

    /// Typed read. A payload that no longer decodes counts as a miss.
    pub async fn get_as<T: DeserializeOwned>(
        &self,
        namespace: CacheNamespace,
        key: Option<&str>,
    ) -> Option<T> {
        let payload = self.get(namespace, key).await?;
        match serde_json::from_value(payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    namespace = namespace.as_str(),
                    key = key.unwrap_or_default(),
                    error = %e,
                    "Cached payload has unexpected shape, treating as miss"
                );
                None
            }
        }
    }

    /// Store `payload` stamped with the current time.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        namespace: CacheNamespace,
        key: Option<&str>,
        payload: &T,
    ) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let full_key = namespace.key(key);

        let serialized = serde_json::to_value(payload)
            .map(CacheEntry::new)
            .and_then(|entry| serde_json::to_string(&entry));
        let raw = match serialized {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %full_key, error = %e, "Could not serialize cache entry");
                return;
            }
        };

        if let Err(e) = store.set(&full_key, raw).await {
            warn!(key = %full_key, error = %e, "Cache write failed");
        }
    }

    /// Remove one entry, or the whole namespace when `key` is `None`.
    pub async fn clear(&self, namespace: CacheNamespace, key: Option<&str>) {
        let Some(store) = self.store.as_ref() else {
            return;
        };

        if key.is_some() {
            let full_key = namespace.key(key);
            if let Err(e) = store.remove(&full_key).await {
                warn!(key = %full_key, error = %e, "Cache clear failed");
            }
            return;
        }

        if let Err(e) = store.remove(&namespace.key(None)).await {
            warn!(namespace = namespace.as_str(), error = %e, "Cache clear failed");
        }
        match store.remove_prefix(&namespace.prefix()).await {
            Ok(removed) => debug!(namespace = namespace.as_str(), removed, "Namespace cleared"),
            Err(e) => warn!(namespace = namespace.as_str(), error = %e, "Cache clear failed"),
        }
    }

    async fn evict(&self, store: &dyn KeyValueStore, key: &str, observed: &str) {
        match store.remove_if_eq(key, observed).await {
            Ok(true) => debug!(key, "Evicted stale cache entry"),
            Ok(false) => debug!(key, "Stale entry already replaced"),
            Err(e) => warn!(key, error = %e, "Cache eviction failed"),
        }
    }
}

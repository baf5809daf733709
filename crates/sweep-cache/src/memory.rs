use async_trait::async_trait;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};

use crate::error::CacheError;
use crate::store::KeyValueStore;

/// In-process key-value store backed by moka.
///
/// No moka TTL is configured. Freshness is judged by the response cache from
/// each entry's own timestamp, so this store only bounds capacity.
pub struct MemoryStore {
    inner: Cache<String, String>,
}

impl MemoryStore {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder().max_capacity(max_capacity).build(),
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.inner.get(key).await)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        self.inner.insert(key.to_string(), value).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.inner.invalidate(key).await;
        Ok(())
    }

    async fn remove_if_eq(&self, key: &str, expected: &str) -> Result<bool, CacheError> {
        let expected = expected.to_string();
        let result = self
            .inner
            .entry_by_ref(key)
            .and_compute_with(move |entry| {
                let op = match entry {
                    Some(current) if *current.value() == expected => Op::Remove,
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
        Ok(matches!(result, CompResult::Removed(_)))
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let keys: Vec<String> = self
            .inner
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.as_ref().clone())
            .collect();
        for key in &keys {
            self.inner.invalidate(key).await;
        }
        Ok(keys.len())
    }
}

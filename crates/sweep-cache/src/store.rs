use async_trait::async_trait;

use crate::error::CacheError;

/// Persistent string key-value store behind the response cache and preferences.
///
/// Every method is atomic for a single key. Nothing locks across keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Insert or overwrite.
    async fn set(&self, key: &str, value: String) -> Result<(), CacheError>;

    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Remove `key` only while it still holds `expected`.
    /// Returns whether an entry was removed.
    async fn remove_if_eq(&self, key: &str, expected: &str) -> Result<bool, CacheError>;

    /// Remove every key starting with `prefix`. Returns the number removed.
    async fn remove_prefix(&self, prefix: &str) -> Result<usize, CacheError>;
}

use std::sync::Arc;

use serde_json::Value;
use sweep_models::cache_schema::{key_patterns, CacheEntry};
use sweep_models::ProviderKind;
use tracing::warn;

use crate::store::KeyValueStore;

/// Remembered provider and per-provider model choices.
///
/// Preferences never expire. When the store is missing or failing, reads
/// return `None` and writes are dropped.
#[derive(Clone)]
pub struct PreferenceStore {
    store: Option<Arc<dyn KeyValueStore>>,
}

impl PreferenceStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store: Some(store) }
    }

    pub fn unavailable() -> Self {
        Self { store: None }
    }

    pub async fn provider(&self) -> Option<ProviderKind> {
        let value = self.read(&key_patterns::preferred_provider()).await?;
        let name = value.as_str()?;
        match name.parse() {
            Ok(kind) => Some(kind),
            Err(e) => {
                warn!(error = %e, "Ignoring stored provider preference");
                None
            }
        }
    }

    pub async fn set_provider(&self, kind: ProviderKind) {
        self.write(
            &key_patterns::preferred_provider(),
            Value::String(kind.as_str().to_string()),
        )
        .await;
    }

    pub async fn model(&self, kind: ProviderKind) -> Option<String> {
        let value = self.read(&key_patterns::preferred_model(kind.as_str())).await?;
        value
            .as_str()
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .map(str::to_string)
    }

    pub async fn set_model(&self, kind: ProviderKind, model: &str) {
        self.write(
            &key_patterns::preferred_model(kind.as_str()),
            Value::String(model.to_string()),
        )
        .await;
    }

    /// Forget the provider preference and every model preference.
    pub async fn clear(&self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        if let Err(e) = store.remove_prefix("pref:").await {
            warn!(error = %e, "Could not clear preferences");
        }
    }

    async fn read(&self, key: &str) -> Option<Value> {
        let store = self.store.as_ref()?;
        let raw = match store.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key, error = %e, "Preference read failed");
                return None;
            }
        };
        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => Some(entry.payload),
            Err(e) => {
                warn!(key, error = %e, "Unreadable preference entry");
                None
            }
        }
    }

    async fn write(&self, key: &str, value: Value) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let raw = match serde_json::to_string(&CacheEntry::new(value)) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "Could not serialize preference");
                return;
            }
        };
        if let Err(e) = store.set(key, raw).await {
            warn!(key, error = %e, "Preference write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn prefs() -> (PreferenceStore, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new(10));
        (PreferenceStore::new(store.clone()), store)
    }

    #[tokio::test]
    async fn provider_roundtrip() {
        let (prefs, _) = prefs();
        assert_eq!(prefs.provider().await, None);

        prefs.set_provider(ProviderKind::OpenAi).await;
        assert_eq!(prefs.provider().await, Some(ProviderKind::OpenAi));
    }

    #[tokio::test]
    async fn models_are_per_provider() {
        let (prefs, _) = prefs();
        prefs.set_model(ProviderKind::Gemini, "gemini-2.0-flash").await;

        assert_eq!(
            prefs.model(ProviderKind::Gemini).await.as_deref(),
            Some("gemini-2.0-flash")
        );
        assert_eq!(prefs.model(ProviderKind::OpenAi).await, None);
    }

    #[tokio::test]
    async fn unknown_stored_provider_is_ignored() {
        let (prefs, store) = prefs();
        let raw = serde_json::to_string(&CacheEntry::new(Value::from("claude"))).unwrap();
        store.set("pref:provider", raw).await.unwrap();

        assert_eq!(prefs.provider().await, None);
    }

    #[tokio::test]
    async fn clear_forgets_everything() {
        let (prefs, _) = prefs();
        prefs.set_provider(ProviderKind::Gemini).await;
        prefs.set_model(ProviderKind::Gemini, "m").await;
        prefs.clear().await;

        assert_eq!(prefs.provider().await, None);
        assert_eq!(prefs.model(ProviderKind::Gemini).await, None);
    }

    #[tokio::test]
    async fn unavailable_store_is_silent() {
        let prefs = PreferenceStore::unavailable();
        prefs.set_provider(ProviderKind::Gemini).await;
        assert_eq!(prefs.provider().await, None);
    }
}

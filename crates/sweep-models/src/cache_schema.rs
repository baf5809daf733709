use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Independent cache namespaces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CacheNamespace {
    /// The published static dataset file. Holds a single entry.
    Static,
    /// Per-symbol backend fetches.
    Backend,
}

impl CacheNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Backend => "backend",
        }
    }

    /// Store key for an entry. `None` addresses the namespace's single entry.
    pub fn key(&self, key: Option<&str>) -> String {
        match key {
            Some(k) => format!("{}:{k}", self.as_str()),
            None => self.as_str().to_string(),
        }
    }

    /// Prefix shared by every keyed entry of this namespace.
    pub fn prefix(&self) -> String {
        format!("{}:", self.as_str())
    }
}

/// A stored payload with its write time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub payload: Value,
    #[serde(rename = "storedAt")]
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            stored_at: Utc::now(),
        }
    }

    /// Valid iff `0 <= now - stored_at < ttl`. A write time in the future
    /// (clock skew, copied store) counts as stale.
    pub fn is_fresh(&self, ttl: std::time::Duration, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.stored_at);
        if age < chrono::Duration::zero() {
            return false;
        }
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => age < ttl,
            Err(_) => true,
        }
    }
}

/// Table holding every persisted value: cache entries and preferences.
///
/// ```sql
/// CREATE TABLE IF NOT EXISTS kv_entries (
///     key         TEXT PRIMARY KEY,
///     value_json  TEXT NOT NULL,
///     updated_at  TEXT NOT NULL
/// );
/// ```
pub const KV_TABLE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS kv_entries (
    key         TEXT PRIMARY KEY,
    value_json  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
";

/// Key conventions for the persistent store.
///
/// - Static dataset: `static`
/// - Backend fetch: `backend:{SYMBOL}` or `backend:{SYMBOL}@{EXPIRY}`
/// - Provider preference: `pref:provider`
/// - Model preference: `pref:model:{provider}`
pub mod key_patterns {
    pub fn backend_symbol(symbol: &str, expiry: Option<&str>) -> String {
        match expiry {
            Some(date) => format!("{symbol}@{date}"),
            None => symbol.to_string(),
        }
    }

    pub fn preferred_provider() -> String {
        "pref:provider".to_string()
    }

    pub fn preferred_model(provider: &str) -> String {
        format!("pref:model:{provider}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn namespace_keys() {
        assert_eq!(CacheNamespace::Static.key(None), "static");
        assert_eq!(CacheNamespace::Backend.key(Some("SPY")), "backend:SPY");
        assert_eq!(CacheNamespace::Backend.prefix(), "backend:");
    }

    #[test]
    fn key_pattern_backend_symbol() {
        assert_eq!(key_patterns::backend_symbol("SPY", None), "SPY");
        assert_eq!(
            key_patterns::backend_symbol("SPY", Some("2024-01-19")),
            "SPY@2024-01-19"
        );
    }

    #[test]
    fn key_pattern_preferences() {
        assert_eq!(key_patterns::preferred_provider(), "pref:provider");
        assert_eq!(key_patterns::preferred_model("gemini"), "pref:model:gemini");
    }

    #[test]
    fn freshness_boundary() {
        let entry = CacheEntry::new(serde_json::json!({"a": 1}));
        let ttl = Duration::from_secs(300);
        assert!(entry.is_fresh(ttl, entry.stored_at));
        assert!(entry.is_fresh(ttl, entry.stored_at + chrono::Duration::seconds(299)));
        assert!(!entry.is_fresh(ttl, entry.stored_at + chrono::Duration::seconds(300)));
    }

    #[test]
    fn future_write_time_is_stale() {
        let entry = CacheEntry::new(serde_json::json!(1));
        let ttl = Duration::from_secs(300);
        assert!(!entry.is_fresh(ttl, entry.stored_at - chrono::Duration::seconds(1)));
        assert!(!entry.is_fresh(ttl, entry.stored_at - chrono::Duration::days(365)));
    }

    #[test]
    fn entry_wire_format_uses_stored_at() {
        let entry = CacheEntry::new(serde_json::json!(1));
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("storedAt").is_some());
    }
}

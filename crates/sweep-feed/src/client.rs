use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use sweep_cache::ResponseCache;
use sweep_models::cache_schema::key_patterns;
use sweep_models::lenient;
use sweep_models::{
    BackendKind, CacheNamespace, CanonicalResponse, FeedConfig, OrderedMap, StructuredData,
    SymbolRecord,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::FeedError;
use crate::reshape::{self, BackendPayload, REMOTE_BULK};
use crate::selector::{BackendSelector, BackendTarget};
use crate::transport::JsonTransport;

/// Result of a single-symbol fetch.
#[derive(Debug, Clone)]
pub struct FetchSuccess {
    pub response: CanonicalResponse,
    pub from_cache: bool,
    /// Backend that served the request. `None` when served from cache.
    pub backend: Option<BackendKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub reason: String,
}

/// Result of a multi-symbol fetch: merged successes plus per-symbol failures.
#[derive(Debug, Clone)]
pub struct BulkFetch {
    pub response: CanonicalResponse,
    pub failed: Vec<SymbolFailure>,
    /// True only if every symbol came from cache.
    pub from_cache: bool,
}

/// Fetches option chains from whichever backend the selector picks,
/// reshapes them into the canonical envelope and caches per symbol.
pub struct BackendClient {
    selector: BackendSelector,
    transport: Arc<dyn JsonTransport>,
    cache: Arc<ResponseCache>,
    supported: Vec<String>,
    cancel: CancellationToken,
}

impl BackendClient {
    pub fn new(
        config: &FeedConfig,
        selector: BackendSelector,
        transport: Arc<dyn JsonTransport>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        Self {
            selector,
            transport,
            cache,
            supported: config
                .supported_symbols
                .iter()
                .map(|s| s.trim().to_ascii_uppercase())
                .collect(),
            cancel: CancellationToken::new(),
        }
    }

    /// Token that aborts in-flight health checks.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Trim, upper-case and check against the allow-list.
    pub fn normalize_symbol(&self, raw: &str) -> Result<String, FeedError> {
        let symbol = raw.trim().to_ascii_uppercase();
        let allowed = self.supported.is_empty() || self.supported.contains(&symbol);
        if symbol.is_empty() || !allowed {
            return Err(FeedError::UnsupportedSymbol(raw.trim().to_string()));
        }
        Ok(symbol)
    }

    pub async fn fetch_one(&self, symbol: &str, force_refresh: bool) -> Result<FetchSuccess, FeedError> {
        self.fetch_expiry(symbol, None, force_refresh).await
    }

    /// Fetch one symbol, optionally pinned to a single expiry date.
    pub async fn fetch_expiry(
        &self,
        symbol: &str,
        expiry: Option<&str>,
        force_refresh: bool,
    ) -> Result<FetchSuccess, FeedError> {
        let symbol = self.normalize_symbol(symbol)?;
        let expiry = expiry.map(str::trim).filter(|e| !e.is_empty());
        let cache_key = key_patterns::backend_symbol(&symbol, expiry);

        if !force_refresh {
            if let Some(response) = self.cached(&cache_key).await {
                info!(symbol = %symbol, from_cache = true, "Backend fetch served from cache");
                return Ok(FetchSuccess {
                    response,
                    from_cache: true,
                    backend: None,
                });
            }
        }

        let target = self.selector.select(&self.cancel).await;
        let response = self.fetch_from(&target, &symbol, expiry, &cache_key).await?;
        Ok(FetchSuccess {
            response,
            from_cache: false,
            backend: Some(target.kind),
        })
    }

    /// Fetch several symbols. Unsupported symbols are reported in `failed`
    /// and never sent upstream. Fails only if no symbol could be fetched.
    pub async fn fetch_many<S: AsRef<str>>(
        &self,
        symbols: &[S],
        force_refresh: bool,
    ) -> Result<BulkFetch, FeedError> {
        let mut normalized: Vec<String> = Vec::with_capacity(symbols.len());
        let mut rejected: Vec<(String, FeedError)> = Vec::new();
        for raw in symbols {
            match self.normalize_symbol(raw.as_ref()) {
                Ok(symbol) if !normalized.contains(&symbol) => normalized.push(symbol),
                Ok(_) => {}
                Err(e) => {
                    warn!(symbol = raw.as_ref().trim(), error = %e, "Skipping unsupported symbol");
                    rejected.push((raw.as_ref().trim().to_string(), e));
                }
            }
        }
        if normalized.is_empty() {
            return Err(match rejected.len() {
                0 => FeedError::NoSymbols,
                1 => rejected.remove(0).1,
                _ => FeedError::AllSymbolsFailed { failures: rejected },
            });
        }

        if !force_refresh {
            if let Some(mut hit) = self.all_cached(&normalized).await {
                info!(count = normalized.len(), from_cache = true, "Bulk fetch served from cache");
                hit.failed = into_failures(rejected);
                return Ok(hit);
            }
        }

        let target = self.selector.select(&self.cancel).await;
        match target.kind {
            BackendKind::Local => {
                self.fetch_many_sequential(&target, &normalized, rejected, force_refresh)
                    .await
            }
            BackendKind::Remote => self.fetch_many_bulk(&target, &normalized, rejected).await,
        }
    }

    /// The local helper has no bulk route, so symbols go one at a time.
    async fn fetch_many_sequential(
        &self,
        target: &BackendTarget,
        symbols: &[String],
        mut failures: Vec<(String, FeedError)>,
        force_refresh: bool,
    ) -> Result<BulkFetch, FeedError> {
        let mut merged = EnvelopeMerge::default();
        let mut all_cached = true;

        for symbol in symbols {
            let cache_key = key_patterns::backend_symbol(symbol, None);
            let cached = if force_refresh {
                None
            } else {
                self.cached(&cache_key).await
            };
            let result = match cached {
                Some(response) => Ok(response),
                None => {
                    all_cached = false;
                    self.fetch_from(target, symbol, None, &cache_key).await
                }
            };

            match result {
                Ok(response) => merged.add(response),
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Symbol fetch failed");
                    failures.push((symbol.clone(), e));
                }
            }
        }

        if merged.is_empty() {
            return Err(FeedError::AllSymbolsFailed { failures });
        }

        Ok(BulkFetch {
            response: merged.finish(reshape::LOCAL_MULTI_EXPIRY, Some(Utc::now().to_rfc3339())),
            failed: into_failures(failures),
            from_cache: all_cached,
        })
    }

    /// One call to the remote bulk route; each returned symbol is cached on its own.
    async fn fetch_many_bulk(
        &self,
        target: &BackendTarget,
        symbols: &[String],
        mut failures: Vec<(String, FeedError)>,
    ) -> Result<BulkFetch, FeedError> {
        let url = format!("{}/api/multiple", target.base_url);
        let joined = symbols.join(",");
        let value = self
            .transport
            .get_json(&url, &[("symbols", joined.as_str())])
            .await
            .inspect_err(|e| warn!(url = %url, error = %e, "Bulk fetch failed"))?;

        let reported = reported_errors(&value);
        let mut response = CanonicalResponse::try_from(value)?;
        response.version = Some(REMOTE_BULK.to_string());

        let mut missing = 0;
        for symbol in symbols {
            let Some(record) = response.symbol(symbol).cloned() else {
                let error = FeedError::SymbolUnavailable {
                    symbol: symbol.clone(),
                    reported: reported.contains(symbol),
                };
                warn!(symbol = %symbol, error = %error, "Symbol absent from bulk response");
                failures.push((symbol.clone(), error));
                missing += 1;
                continue;
            };

            let mut slice = OrderedMap::new();
            slice.insert(symbol.clone(), record);
            let slice = CanonicalResponse::from_symbols(REMOTE_BULK, response.generated_at.clone(), slice);
            self.cache
                .put(CacheNamespace::Backend, Some(symbol), &slice)
                .await;
        }

        let nothing_else = response.structured.is_none() && response.legacy_text.is_none();
        if missing == symbols.len() && nothing_else {
            return Err(FeedError::AllSymbolsFailed { failures });
        }

        let failed = into_failures(failures);
        info!(
            requested = symbols.len(),
            failed = failed.len(),
            backend = %target.kind,
            "Bulk fetch complete"
        );
        Ok(BulkFetch {
            response,
            failed,
            from_cache: false,
        })
    }

    async fn fetch_from(
        &self,
        target: &BackendTarget,
        symbol: &str,
        expiry: Option<&str>,
        cache_key: &str,
    ) -> Result<CanonicalResponse, FeedError> {
        let (url, mut query) = match target.kind {
            BackendKind::Local => (format!("{}/options/{symbol}", target.base_url), Vec::new()),
            BackendKind::Remote => (format!("{}/api", target.base_url), vec![("symbol", symbol)]),
        };
        if let Some(expiry) = expiry {
            query.push(("expiry", expiry));
        }

        let value = self
            .transport
            .get_json(&url, &query)
            .await
            .inspect_err(|e| warn!(symbol, url = %url, error = %e, "Backend fetch failed"))?;

        let payload = BackendPayload::classify(value)?;
        let response =
            reshape::into_symbol_envelope(symbol, payload, target.kind == BackendKind::Local);

        self.cache
            .put(CacheNamespace::Backend, Some(cache_key), &response)
            .await;
        info!(
            symbol,
            backend = %target.kind,
            version = response.version.as_deref().unwrap_or_default(),
            "Backend fetch complete"
        );
        Ok(response)
    }

    async fn cached(&self, cache_key: &str) -> Option<CanonicalResponse> {
        self.cache
            .get_as::<CanonicalResponse>(CacheNamespace::Backend, Some(cache_key))
            .await
    }

    /// Every symbol cached, or nothing.
    async fn all_cached(&self, symbols: &[String]) -> Option<BulkFetch> {
        let mut merged = EnvelopeMerge::default();
        for symbol in symbols {
            let response = self.cached(&key_patterns::backend_symbol(symbol, None)).await?;
            merged.add(response);
        }
        Some(BulkFetch {
            response: merged.finish(REMOTE_BULK, None),
            failed: Vec::new(),
            from_cache: true,
        })
    }
}

/// Folds per-symbol responses into one envelope. Symbol records merge by
/// key, the first structured section wins and legacy text blocks are joined
/// in request order.
#[derive(Default)]
struct EnvelopeMerge {
    merged: usize,
    version: Option<String>,
    symbols: OrderedMap<SymbolRecord>,
    structured: Option<StructuredData>,
    legacy: Vec<String>,
}

impl EnvelopeMerge {
    fn add(&mut self, response: CanonicalResponse) {
        self.merged += 1;
        if self.version.is_none() {
            self.version = response.version;
        }
        if let Some(symbols) = response.symbols {
            self.symbols.extend(symbols);
        }
        if self.structured.is_none() {
            self.structured = response.structured;
        }
        if let Some(text) = response.legacy_text {
            self.legacy.push(text);
        }
    }

    fn is_empty(&self) -> bool {
        self.merged == 0
    }

    /// `default_version` applies only when no merged response carried one.
    fn finish(self, default_version: &str, generated_at: Option<String>) -> CanonicalResponse {
        CanonicalResponse {
            version: Some(self.version.unwrap_or_else(|| default_version.to_string())),
            generated_at,
            structured: self.structured,
            legacy_text: (!self.legacy.is_empty()).then(|| self.legacy.join("\n")),
            symbols: (!self.symbols.is_empty()).then_some(self.symbols),
        }
    }
}

fn into_failures(failures: Vec<(String, FeedError)>) -> Vec<SymbolFailure> {
    failures
        .into_iter()
        .map(|(symbol, e)| SymbolFailure {
            symbol,
            reason: e.to_string(),
        })
        .collect()
}

/// Symbols listed under `metadata.errors`. Accepts strings or `{symbol}` objects.
fn reported_errors(value: &Value) -> Vec<String> {
    let Some(Value::Array(errors)) = value.pointer("/metadata/errors") else {
        return Vec::new();
    };
    errors
        .iter()
        .filter_map(|e| match e {
            Value::Object(obj) => obj.get("symbol").and_then(lenient::value_to_text),
            other => lenient::value_to_text(other),
        })
        .map(|s| s.trim().to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reported_errors_shapes() {
        assert!(reported_errors(&json!({"metadata": {"errors": null}})).is_empty());
        assert_eq!(
            reported_errors(&json!({"metadata": {"errors": ["ndx", {"symbol": "SPX"}]}})),
            vec!["NDX".to_string(), "SPX".to_string()]
        );
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::lenient;
use crate::ordered_map::OrderedMap;

/// Upstream payload rejected at the boundary.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload has none of the known sections (symbols, structured, legacy)")]
    NoKnownShape,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The canonical upstream envelope.
///
/// Any combination of `symbols`, `structured` and `legacy` may be present;
/// an envelope with none of them is rejected by [`CanonicalResponse::try_from`].
/// Sections that fail to decode are dropped with a warning instead of failing
/// the whole envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(try_from = "Value")]
pub struct CanonicalResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "generated", skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<StructuredData>,
    #[serde(rename = "legacy", skip_serializing_if = "Option::is_none")]
    pub legacy_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbols: Option<OrderedMap<SymbolRecord>>,
}

/// One section of an envelope, in normalization order.
#[derive(Debug, Clone, Copy)]
pub enum PayloadSource<'a> {
    Symbols(&'a OrderedMap<SymbolRecord>),
    Structured(&'a StructuredData),
    LegacyText(&'a str),
}

impl CanonicalResponse {
    pub fn from_json_str(json: &str) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_str(json)?;
        Self::try_from(value)
    }

    /// Build an envelope around a symbol map.
    pub fn from_symbols(
        version: impl Into<String>,
        generated_at: Option<String>,
        symbols: OrderedMap<SymbolRecord>,
    ) -> Self {
        Self {
            version: Some(version.into()),
            generated_at,
            symbols: Some(symbols),
            ..Default::default()
        }
    }

    /// The sections present, ordered symbols → structured → legacy.
    pub fn sources(&self) -> Vec<PayloadSource<'_>> {
        let mut sources = Vec::with_capacity(3);
        if let Some(symbols) = &self.symbols {
            sources.push(PayloadSource::Symbols(symbols));
        }
        if let Some(structured) = &self.structured {
            sources.push(PayloadSource::Structured(structured));
        }
        if let Some(text) = &self.legacy_text {
            sources.push(PayloadSource::LegacyText(text));
        }
        sources
    }

    pub fn symbol(&self, symbol: &str) -> Option<&SymbolRecord> {
        self.symbols.as_ref().and_then(|s| s.get(symbol))
    }
}

impl TryFrom<Value> for CanonicalResponse {
    type Error = EnvelopeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut obj) = value else {
            return Err(EnvelopeError::NotAnObject);
        };

        let version = obj.get("version").and_then(lenient::value_to_text);
        let generated_at = obj
            .get("generated")
            .or_else(|| obj.get("generatedAt"))
            .and_then(lenient::value_to_text);

        let structured = match obj.remove("structured") {
            None | Some(Value::Null) => None,
            Some(v) => serde_json::from_value::<StructuredData>(v)
                .map_err(|e| warn!(error = %e, "Dropping undecodable structured section"))
                .ok(),
        };

        let legacy_text = match obj.remove("legacy") {
            Some(Value::String(text)) if !text.trim().is_empty() => Some(text),
            None | Some(Value::Null) | Some(Value::String(_)) => None,
            Some(_) => {
                warn!("Dropping non-text legacy section");
                None
            }
        };

        let symbols = match obj.remove("symbols") {
            Some(Value::Object(map)) => decode_symbols(map),
            None | Some(Value::Null) => None,
            Some(_) => {
                warn!("Dropping non-object symbols section");
                None
            }
        };

        let response = Self {
            version,
            generated_at,
            structured,
            legacy_text,
            symbols,
        };

        if response.sources().is_empty() {
            return Err(EnvelopeError::NoKnownShape);
        }
        Ok(response)
    }
}

fn decode_symbols(map: Map<String, Value>) -> Option<OrderedMap<SymbolRecord>> {
    let mut symbols = OrderedMap::new();
    for (symbol, raw) in map {
        match serde_json::from_value::<SymbolRecord>(raw) {
            Ok(record) => {
                symbols.insert(symbol, record);
            }
            Err(e) => warn!(symbol = %symbol, error = %e, "Dropping undecodable symbol record"),
        }
    }
    (!symbols.is_empty()).then_some(symbols)
}

/// Per-symbol option data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SymbolRecord {
    #[serde(default, deserialize_with = "lenient::number")]
    pub spot: Option<f64>,
    #[serde(
        default,
        rename = "generated",
        alias = "generatedAt",
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub generated_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub expiries: Vec<ExpiryRecord>,
    #[serde(
        default,
        rename = "legacy",
        deserialize_with = "lenient::or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub legacy_map: Option<OrderedMap<LegacyEntry>>,
}

/// Pre-rendered text for one expiry, keyed `"LABEL (DATE)"` upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LegacyEntry {
    #[serde(default, deserialize_with = "lenient::text_or_empty")]
    pub content: String,
    #[serde(
        default,
        rename = "type",
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ExpiryRecord {
    #[serde(default, deserialize_with = "lenient::text_or_empty")]
    pub label: String,
    #[serde(default, deserialize_with = "lenient::text_or_empty")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient::list")]
    pub options: Vec<OptionRecord>,
    #[serde(
        default,
        rename = "gammaFlip",
        deserialize_with = "lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub gamma_flip: Option<f64>,
    #[serde(
        default,
        rename = "callWalls",
        deserialize_with = "lenient::numbers",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub call_walls: Vec<f64>,
    #[serde(
        default,
        rename = "putWalls",
        deserialize_with = "lenient::numbers",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub put_walls: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OptionSide {
    #[serde(rename = "CALL", alias = "call", alias = "Call")]
    Call,
    #[serde(rename = "PUT", alias = "put", alias = "Put")]
    Put,
}

impl OptionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "CALL",
            Self::Put => "PUT",
        }
    }
}

/// One contract row. Numeric fields are optional and never fail decoding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionRecord {
    #[serde(default, deserialize_with = "lenient::number")]
    pub strike: Option<f64>,
    pub side: OptionSide,
    #[serde(default, rename = "iv", deserialize_with = "lenient::number")]
    pub implied_vol: Option<f64>,
    #[serde(default, rename = "oi", deserialize_with = "lenient::count")]
    pub open_interest: Option<u64>,
    #[serde(default, rename = "vol", deserialize_with = "lenient::count")]
    pub volume: Option<u64>,
}

/// Auto-fetched levels in the structured section. Levels are opaque values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StructuredData {
    #[serde(default, deserialize_with = "lenient::number")]
    pub spot_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub call_levels: Vec<Value>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub put_levels: Vec<Value>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub gamma_levels: Vec<Value>,
    #[serde(
        default,
        deserialize_with = "lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub gamma_flip: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_symbols_envelope() {
        let resp = CanonicalResponse::from_json_str(
            r#"{
                "version": "14.0",
                "generated": "2024-01-19T09:30:00",
                "symbols": {
                    "SPY": {
                        "spot": 475.31,
                        "generated": "2024-01-19T09:30:00",
                        "expiries": [
                            {"label": "0DTE", "date": "2024-01-19", "options": [
                                {"strike": 475.0, "side": "CALL", "iv": 0.1234, "oi": 1200, "vol": 300}
                            ]}
                        ],
                        "legacy": {
                            "0DTE (2024-01-19)": {"content": "STRIKE | TIPO", "type": "0DTE", "date": "2024-01-19"}
                        }
                    }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(resp.version.as_deref(), Some("14.0"));
        let spy = resp.symbol("SPY").unwrap();
        assert_eq!(spy.spot, Some(475.31));
        assert_eq!(spy.expiries.len(), 1);
        assert_eq!(spy.expiries[0].options[0].side, OptionSide::Call);
        assert_eq!(spy.legacy_map.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn rejects_payload_with_no_known_section() {
        let err = CanonicalResponse::try_from(json!({"version": "1.0", "metadata": {}})).unwrap_err();
        assert!(matches!(err, EnvelopeError::NoKnownShape));

        let err = CanonicalResponse::try_from(json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, EnvelopeError::NotAnObject));
    }

    #[test]
    fn bad_section_is_dropped_not_fatal() {
        let resp = CanonicalResponse::try_from(json!({
            "structured": "not an object",
            "legacy": "SPOT: 101.25"
        }))
        .unwrap();
        assert!(resp.structured.is_none());
        assert_eq!(resp.legacy_text.as_deref(), Some("SPOT: 101.25"));
    }

    #[test]
    fn malformed_numbers_decode_as_missing() {
        let resp = CanonicalResponse::try_from(json!({
            "symbols": {
                "QQQ": {
                    "spot": "n/a",
                    "expiries": [
                        {"label": "WEEKLY", "date": "2024-01-26", "options": [
                            {"strike": "abc", "side": "PUT", "iv": null, "oi": "12", "vol": -1},
                            {"strike": 400, "side": "STRADDLE"}
                        ]}
                    ]
                }
            }
        }))
        .unwrap();

        let qqq = resp.symbol("QQQ").unwrap();
        assert_eq!(qqq.spot, None);
        let options = &qqq.expiries[0].options;
        // The unknown side is skipped; the bad numbers are not.
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].strike, None);
        assert_eq!(options[0].open_interest, Some(12));
        assert_eq!(options[0].volume, None);
    }

    #[test]
    fn serialize_then_decode_keeps_symbol_order() {
        let mut symbols = OrderedMap::new();
        symbols.insert("QQQ".to_string(), SymbolRecord::default());
        symbols.insert("SPY".to_string(), SymbolRecord::default());
        let resp = CanonicalResponse::from_symbols("local-multi-expiry", None, symbols);

        let json = serde_json::to_string(&resp).unwrap();
        let back: CanonicalResponse = serde_json::from_str(&json).unwrap();
        let keys: Vec<&str> = back.symbols.as_ref().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["QQQ", "SPY"]);
        assert_eq!(back.version.as_deref(), Some("local-multi-expiry"));
    }

    #[test]
    fn sources_follow_normalization_order() {
        let resp = CanonicalResponse::try_from(json!({
            "legacy": "SPOT: 1",
            "structured": {"spot_price": 2},
            "symbols": {"SPY": {"spot": 3}}
        }))
        .unwrap();
        let sources = resp.sources();
        assert!(matches!(sources[0], PayloadSource::Symbols(_)));
        assert!(matches!(sources[1], PayloadSource::Structured(_)));
        assert!(matches!(sources[2], PayloadSource::LegacyText(_)));
    }
}

//! Backend dialects mapped onto the canonical envelope.

use serde::Deserialize;
use serde_json::Value;
use sweep_models::lenient;
use sweep_models::{
    CanonicalResponse, EnvelopeError, ExpiryRecord, OptionRecord, OptionSide, OrderedMap,
    SymbolRecord,
};

pub const LOCAL_MULTI_EXPIRY: &str = "local-multi-expiry";
pub const LOCAL_SINGLE_EXPIRY: &str = "local-single-expiry";
pub const REMOTE_SINGLE: &str = "remote-single";
pub const REMOTE_BULK: &str = "remote-bulk";

/// Label given to the one expiry of a flat chain.
pub const SINGLE_LABEL: &str = "SINGLE";

/// A backend response, discriminated by shape.
#[derive(Debug, Clone)]
pub enum BackendPayload {
    /// Already canonical: `symbols`, `structured` or `legacy` present.
    Envelope(CanonicalResponse),
    /// `{symbol, currentPrice, expiries[...]}` from the local helper.
    MultiExpiry(MultiExpiryChain),
    /// `{symbol, currentPrice, expiry, calls[], puts[]}`.
    SingleExpiry(SingleExpiryChain),
}

impl BackendPayload {
    pub fn classify(value: Value) -> Result<Self, EnvelopeError> {
        let Value::Object(obj) = &value else {
            return Err(EnvelopeError::NotAnObject);
        };

        if ["symbols", "structured", "legacy"]
            .iter()
            .any(|key| obj.contains_key(*key))
        {
            return CanonicalResponse::try_from(value).map(Self::Envelope);
        }
        if obj.get("expiries").is_some_and(Value::is_array) {
            return Ok(Self::MultiExpiry(serde_json::from_value(value)?));
        }
        if obj.contains_key("calls") || obj.contains_key("puts") {
            return Ok(Self::SingleExpiry(serde_json::from_value(value)?));
        }
        Err(EnvelopeError::NoKnownShape)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultiExpiryChain {
    #[serde(default, deserialize_with = "lenient::text")]
    pub symbol: Option<String>,
    #[serde(default, rename = "currentPrice", deserialize_with = "lenient::number")]
    pub current_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub expiries: Vec<ChainExpiry>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainExpiry {
    #[serde(default, rename = "expiryDate", deserialize_with = "lenient::text_or_empty")]
    pub expiry_date: String,
    #[serde(default, deserialize_with = "lenient::text_or_empty")]
    pub label: String,
    #[serde(default, deserialize_with = "lenient::list")]
    pub calls: Vec<Contract>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub puts: Vec<Contract>,
    #[serde(default, rename = "gammaFlip", deserialize_with = "lenient::number")]
    pub gamma_flip: Option<f64>,
    #[serde(default, rename = "callWalls", deserialize_with = "lenient::list")]
    pub call_walls: Vec<GammaWall>,
    #[serde(default, rename = "putWalls", deserialize_with = "lenient::list")]
    pub put_walls: Vec<GammaWall>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SingleExpiryChain {
    #[serde(default, deserialize_with = "lenient::text")]
    pub symbol: Option<String>,
    #[serde(default, rename = "currentPrice", deserialize_with = "lenient::number")]
    pub current_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub expiry: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub calls: Vec<Contract>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub puts: Vec<Contract>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contract {
    #[serde(default, deserialize_with = "lenient::number")]
    pub strike: Option<f64>,
    #[serde(default, rename = "impliedVolatility", deserialize_with = "lenient::number")]
    pub implied_volatility: Option<f64>,
    #[serde(default, rename = "openInterest", deserialize_with = "lenient::count")]
    pub open_interest: Option<u64>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub volume: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GammaWall {
    #[serde(default, deserialize_with = "lenient::number")]
    pub strike: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub gamma: Option<f64>,
}

impl Contract {
    fn into_record(self, side: OptionSide) -> OptionRecord {
        OptionRecord {
            strike: self.strike,
            side,
            implied_vol: self.implied_volatility,
            open_interest: self.open_interest,
            volume: self.volume,
        }
    }
}

fn options(calls: Vec<Contract>, puts: Vec<Contract>) -> Vec<OptionRecord> {
    calls
        .into_iter()
        .map(|c| c.into_record(OptionSide::Call))
        .chain(puts.into_iter().map(|p| p.into_record(OptionSide::Put)))
        .collect()
}

fn wall_strikes(walls: Vec<GammaWall>) -> Vec<f64> {
    walls.into_iter().filter_map(|w| w.strike).collect()
}

impl From<MultiExpiryChain> for SymbolRecord {
    fn from(chain: MultiExpiryChain) -> Self {
        let expiries = chain
            .expiries
            .into_iter()
            .map(|expiry| ExpiryRecord {
                label: expiry.label,
                date: expiry.expiry_date,
                options: options(expiry.calls, expiry.puts),
                gamma_flip: expiry.gamma_flip,
                call_walls: wall_strikes(expiry.call_walls),
                put_walls: wall_strikes(expiry.put_walls),
            })
            .collect();

        SymbolRecord {
            spot: chain.current_price,
            generated_at: chain.timestamp,
            expiries,
            legacy_map: None,
        }
    }
}

impl From<SingleExpiryChain> for SymbolRecord {
    fn from(chain: SingleExpiryChain) -> Self {
        SymbolRecord {
            spot: chain.current_price,
            generated_at: chain.timestamp,
            expiries: vec![ExpiryRecord {
                label: SINGLE_LABEL.to_string(),
                date: chain.expiry.unwrap_or_default(),
                options: options(chain.calls, chain.puts),
                ..Default::default()
            }],
            legacy_map: None,
        }
    }
}

/// Reshape a single-symbol response into a one-symbol envelope, tagged with
/// the dialect it came from. A canonical envelope keeps its own version.
pub fn into_symbol_envelope(
    symbol: &str,
    payload: BackendPayload,
    local: bool,
) -> CanonicalResponse {
    let (version, generated_at, record) = match payload {
        BackendPayload::Envelope(envelope) => return envelope,
        BackendPayload::MultiExpiry(chain) => {
            let version = if local { LOCAL_MULTI_EXPIRY } else { REMOTE_SINGLE };
            (version, chain.timestamp.clone(), SymbolRecord::from(chain))
        }
        BackendPayload::SingleExpiry(chain) => {
            let version = if local { LOCAL_SINGLE_EXPIRY } else { REMOTE_SINGLE };
            (version, chain.timestamp.clone(), SymbolRecord::from(chain))
        }
    };

    let mut symbols = OrderedMap::new();
    symbols.insert(symbol.to_string(), record);
    CanonicalResponse::from_symbols(version, generated_at, symbols)
}

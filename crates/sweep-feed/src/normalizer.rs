//! Conversion of a [`CanonicalResponse`] into displayable datasets.
//!
//! Normalization never fails. Missing or malformed numbers render as `N/A`,
//! and a section that yields nothing contributes zero datasets.

use std::fmt::Write;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use sweep_models::{
    CanonicalResponse, DatasetKind, ExpiryRecord, LegacyEntry, MarketDataset, OrderedMap,
    PayloadSource, StructuredData, SymbolRecord,
};

pub const PLACEHOLDER: &str = "N/A";
pub const TABLE_HEADER: &str = "STRIKE | TYPE | IV | OI | VOL";
pub const STRUCTURED_DATASET_NAME: &str = "Auto-fetched structured data";

const START_EXPIRY: &str = "=== START_EXPIRY:";
const END_EXPIRY: &str = "=== END_EXPIRY";

static SPOT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"SPOT[\s:|]+([-+]?\d+(?:\.\d+)?)").expect("static regex")
});
static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"DATE:\s*([^\s=|]+)").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NormalizedData {
    pub datasets: Vec<MarketDataset>,
    pub spot: Option<f64>,
}

/// Run every present section in order: symbols, structured, legacy text.
///
/// The first section to resolve a spot price wins. Datasets from all
/// sections are concatenated.
pub fn normalize(response: &CanonicalResponse) -> NormalizedData {
    let mut out = NormalizedData::default();

    for source in response.sources() {
        match source {
            PayloadSource::Symbols(symbols) => {
                let spot = render_symbols(symbols, &mut out.datasets);
                out.spot = out.spot.or(spot);
            }
            PayloadSource::Structured(structured) => {
                out.spot = out.spot.or(structured.spot_price);
                out.datasets.push(render_structured(structured));
            }
            PayloadSource::LegacyText(text) => {
                out.datasets.extend(split_legacy_text(text));
                if out.spot.is_none() {
                    out.spot = extract_spot(text);
                }
            }
        }
    }

    out
}

/// Datasets for every symbol in insertion order. Returns the first spot seen.
fn render_symbols(symbols: &OrderedMap<SymbolRecord>, datasets: &mut Vec<MarketDataset>) -> Option<f64> {
    let mut spot = None;
    for (symbol, record) in symbols.iter() {
        spot = spot.or(record.spot);

        match record.legacy_map.as_ref().filter(|map| !map.is_empty()) {
            Some(map) => {
                for (index, (key, entry)) in map.iter().enumerate() {
                    datasets.push(render_legacy_entry(symbol, index, key, entry));
                }
            }
            None => {
                for (index, expiry) in record.expiries.iter().enumerate() {
                    datasets.push(MarketDataset::new(
                        format!("{symbol}-{index}"),
                        expiry_name(symbol, expiry),
                        render_expiry_table(symbol, record.spot, expiry),
                        DatasetKind::classify(&expiry.label),
                    ));
                }
            }
        }
    }
    spot
}

fn render_legacy_entry(symbol: &str, index: usize, key: &str, entry: &LegacyEntry) -> MarketDataset {
    let kind = entry
        .kind
        .as_deref()
        .map(DatasetKind::classify)
        .filter(|kind| *kind != DatasetKind::Other)
        .unwrap_or_else(|| DatasetKind::classify(key));

    MarketDataset::new(
        format!("{symbol}-legacy-{index}"),
        format!("{symbol} {key}"),
        entry.content.clone(),
        kind,
    )
}

fn expiry_name(symbol: &str, expiry: &ExpiryRecord) -> String {
    match (expiry.label.trim(), expiry.date.trim()) {
        ("", "") => symbol.to_string(),
        (label, "") => format!("{symbol} {label}"),
        ("", date) => format!("{symbol} ({date})"),
        (label, date) => format!("{symbol} {label} ({date})"),
    }
}

/// Fixed-layout table for one expiry.
pub fn render_expiry_table(symbol: &str, spot: Option<f64>, expiry: &ExpiryRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "SPOT: {}", fmt_decimal(spot, 2));
    let _ = writeln!(out, "SYMBOL: {symbol}");
    let _ = writeln!(out, "EXPIRY: {} ({})", expiry.label, expiry.date);
    out.push_str(TABLE_HEADER);
    out.push('\n');

    for option in &expiry.options {
        let _ = writeln!(
            out,
            "{} | {} | {} | {} | {}",
            fmt_decimal(option.strike, 2),
            option.side.as_str(),
            fmt_decimal(option.implied_vol, 4),
            fmt_count(option.open_interest),
            fmt_count(option.volume),
        );
    }

    if expiry.gamma_flip.is_some() {
        let _ = writeln!(out, "GAMMA FLIP: {}", fmt_decimal(expiry.gamma_flip, 2));
    }
    if !expiry.call_walls.is_empty() {
        let _ = writeln!(out, "CALL WALLS: {}", fmt_strikes(&expiry.call_walls));
    }
    if !expiry.put_walls.is_empty() {
        let _ = writeln!(out, "PUT WALLS: {}", fmt_strikes(&expiry.put_walls));
    }

    out.trim_end().to_string()
}

fn render_structured(structured: &StructuredData) -> MarketDataset {
    let mut out = String::new();
    let _ = writeln!(out, "SPOT: {}", fmt_decimal(structured.spot_price, 2));
    for (title, levels) in [
        ("CALL LEVELS", &structured.call_levels),
        ("PUT LEVELS", &structured.put_levels),
        ("GAMMA LEVELS", &structured.gamma_levels),
    ] {
        let _ = writeln!(out, "{title}:");
        if levels.is_empty() {
            let _ = writeln!(out, "  (none)");
        }
        for level in levels {
            let _ = writeln!(out, "  {}", render_level(level));
        }
    }
    if structured.gamma_flip.is_some() {
        let _ = writeln!(out, "GAMMA FLIP: {}", fmt_decimal(structured.gamma_flip, 2));
    }

    MarketDataset::new(
        "structured",
        STRUCTURED_DATASET_NAME,
        out.trim_end(),
        DatasetKind::Other,
    )
}

/// Levels are opaque. Objects render as `key: value` pairs.
fn render_level(level: &Value) -> String {
    match level {
        Value::Object(fields) => fields
            .iter()
            .map(|(key, value)| format!("{key}: {}", render_scalar(value)))
            .collect::<Vec<_>>()
            .join(" | "),
        other => render_scalar(other),
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => fmt_decimal(n.as_f64(), 2),
        },
        Value::String(s) => s.clone(),
        Value::Null => PLACEHOLDER.to_string(),
        other => other.to_string(),
    }
}

/// Split legacy text on expiry delimiters. Text without delimiters is one dataset.
pub fn split_legacy_text(text: &str) -> Vec<MarketDataset> {
    if !text.contains(START_EXPIRY) {
        return vec![MarketDataset::new(
            "legacy-0",
            "Legacy data",
            text,
            DatasetKind::Other,
        )];
    }

    text.split(START_EXPIRY)
        .skip(1)
        .enumerate()
        .map(|(index, section)| {
            let (header, rest) = section.split_once('\n').unwrap_or((section, ""));
            let label = header
                .split('|')
                .next()
                .unwrap_or_default()
                .trim()
                .trim_end_matches('=')
                .trim();
            let date = DATE_RE
                .captures(header)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str());
            let body = match rest.find(END_EXPIRY) {
                Some(end) => &rest[..end],
                None => rest,
            };

            let name = match (label, date) {
                ("", None) => format!("Expiry {}", index + 1),
                ("", Some(date)) => format!("Expiry ({date})"),
                (label, None) => label.to_string(),
                (label, Some(date)) => format!("{label} ({date})"),
            };

            MarketDataset::new(
                format!("legacy-{index}"),
                name,
                body.trim(),
                DatasetKind::classify(label),
            )
        })
        .collect()
}

/// First number following a `SPOT` token.
pub fn extract_spot(text: &str) -> Option<f64> {
    SPOT_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn fmt_decimal(value: Option<f64>, places: usize) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => format!("{v:.places$}"),
        None => PLACEHOLDER.to_string(),
    }
}

fn fmt_count(value: Option<u64>) -> String {
    value.map_or_else(|| PLACEHOLDER.to_string(), |v| v.to_string())
}

fn fmt_strikes(strikes: &[f64]) -> String {
    strikes
        .iter()
        .map(|s| fmt_decimal(Some(*s), 2))
        .collect::<Vec<_>>()
        .join(", ")
}

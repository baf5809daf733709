//! Tolerant field decoders for upstream payloads.
//!
//! Upstream producers emit numbers as JSON numbers, numeric strings, `null`,
//! or garbage. None of these may fail the enclosing record: anything that is
//! not a usable value decodes to "missing".

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Convert a JSON scalar to a finite `f64`.
pub fn value_to_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Convert a JSON scalar to a non-negative count. Fractional values truncate.
pub fn value_to_u64(value: &Value) -> Option<u64> {
    if let Value::Number(n) = value {
        if let Some(v) = n.as_u64() {
            return Some(v);
        }
    }
    value_to_f64(value)
        .filter(|v| *v >= 0.0)
        .map(|v| v.trunc() as u64)
}

/// Convert a JSON scalar to text. Numbers and booleans are stringified.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_f64))
}

pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_u64))
}

pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_text))
}

/// Like [`text`] but collapses missing values to an empty string.
pub fn text_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(text(deserializer)?.unwrap_or_default())
}

/// Decode an array, skipping elements that do not decode. Non-arrays decode empty.
pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::Array(items)) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// Decode an array of numbers, skipping anything non-numeric.
pub fn numbers<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::Array(items)) = value else {
        return Ok(Vec::new());
    };
    Ok(items.iter().filter_map(value_to_f64).collect())
}

/// Decode any value into `T`, treating a mismatch as absent.
pub fn or_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| !v.is_null())
        .and_then(|v| serde_json::from_value(v).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_from_strings_and_garbage() {
        assert_eq!(value_to_f64(&json!(1.5)), Some(1.5));
        assert_eq!(value_to_f64(&json!(" 101.25 ")), Some(101.25));
        assert_eq!(value_to_f64(&json!("n/a")), None);
        assert_eq!(value_to_f64(&json!(null)), None);
        assert_eq!(value_to_f64(&json!({"x": 1})), None);
    }

    #[test]
    fn counts_truncate_and_reject_negative() {
        assert_eq!(value_to_u64(&json!(12)), Some(12));
        assert_eq!(value_to_u64(&json!(12.9)), Some(12));
        assert_eq!(value_to_u64(&json!("7")), Some(7));
        assert_eq!(value_to_u64(&json!(-3)), None);
    }

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "number")]
        price: Option<f64>,
        #[serde(default, deserialize_with = "list")]
        items: Vec<u32>,
    }

    #[test]
    fn record_survives_bad_fields() {
        let sample: Sample = serde_json::from_value(json!({
            "price": "abc",
            "items": [1, "two", 3]
        }))
        .unwrap();
        assert_eq!(sample.price, None);
        assert_eq!(sample.items, vec![1, 3]);

        let empty: Sample = serde_json::from_value(json!({"items": "nope"})).unwrap();
        assert!(empty.items.is_empty());
    }
}

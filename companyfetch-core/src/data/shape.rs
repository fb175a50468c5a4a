//! Best-effort normalization of provider JSON into JSON-native values.
//!
//! Yahoo wraps most numbers and dates as `{"raw": 1718841600, "fmt": "2024-06-20"}`.
//! Dates keep their formatted `YYYY-MM-DD` string, everything else keeps the raw
//! number. Empty `{}` leaves (Yahoo's "no value") become `null`.

use chrono::NaiveDate;
use serde_json::{Map, Value};

/// Keys Yahoo attaches to every module for its own caching.
const PROVIDER_BOOKKEEPING_KEYS: &[&str] = &["maxAge"];

/// Normalize an arbitrary provider value.
pub fn normalize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            if map.is_empty() {
                return Value::Null;
            }
            if let Some(collapsed) = collapse_formatted(&map) {
                return collapsed;
            }
            Value::Object(normalize_object(map))
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_value).collect()),
        other => other,
    }
}

/// Normalize every field of an object, dropping provider bookkeeping keys.
pub fn normalize_object(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .filter(|(key, _)| !PROVIDER_BOOKKEEPING_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key, normalize_value(value)))
        .collect()
}

/// `{"raw": .., "fmt": .., "longFmt": ..}` → date string or raw value.
fn collapse_formatted(map: &Map<String, Value>) -> Option<Value> {
    let raw = map.get("raw")?;
    if !map
        .keys()
        .all(|k| matches!(k.as_str(), "raw" | "fmt" | "longFmt"))
    {
        return None;
    }

    if let Some(Value::String(fmt)) = map.get("fmt") {
        if NaiveDate::parse_from_str(fmt, "%Y-%m-%d").is_ok() {
            return Some(Value::String(fmt.clone()));
        }
    }
    Some(raw.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn formatted_date_keeps_string() {
        let v = json!({"raw": 1718841600, "fmt": "2024-06-20"});
        assert_eq!(normalize_value(v), json!("2024-06-20"));
    }

    #[test]
    fn formatted_number_keeps_raw() {
        let v = json!({"raw": 0.0123, "fmt": "1.23%"});
        assert_eq!(normalize_value(v), json!(0.0123));

        let v = json!({"raw": 2_900_000_000_000_i64, "fmt": "2.9T", "longFmt": "2,900,000,000,000"});
        assert_eq!(normalize_value(v), json!(2_900_000_000_000_i64));
    }

    #[test]
    fn empty_object_becomes_null() {
        assert_eq!(normalize_value(json!({})), Value::Null);
    }

    #[test]
    fn object_with_extra_keys_is_not_collapsed() {
        let v = json!({"raw": 1, "label": "one"});
        assert_eq!(normalize_value(v), json!({"raw": 1, "label": "one"}));
    }

    #[test]
    fn nested_structures_are_walked() {
        let v = json!({
            "maxAge": 86400,
            "sector": "Technology",
            "companyOfficers": [
                {"name": "Jane", "totalPay": {"raw": 100, "fmt": "100"}, "maxAge": 1}
            ],
            "dividendRate": {}
        });
        let out = Value::Object(normalize_object(v.as_object().cloned().unwrap()));
        assert_eq!(
            out,
            json!({
                "sector": "Technology",
                "companyOfficers": [{"name": "Jane", "totalPay": 100}],
                "dividendRate": null
            })
        );
    }
}

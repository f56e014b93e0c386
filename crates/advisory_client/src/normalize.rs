//! Raw advisory payload → `SafetyRecord` normalization.
//!
//! Per-entry problems are skipped, never fatal: a partially broken
//! payload still yields every entry that is well formed.

use std::collections::BTreeMap;

use common::{Error, Result, SafetyRecord};
use serde_json::Value;
use tracing::debug;

/// Parse a response body and normalize it.
///
/// The body must be an object with an object-valued `data` field;
/// anything else is a malformed payload.
pub fn normalize_body(body: &Value) -> Result<BTreeMap<String, SafetyRecord>> {
    let data = body
        .get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::MalformedPayload("expected an object at `data`".into()))?;

    let mut records = BTreeMap::new();
    for (code, item) in data {
        match normalize_entry(code, item) {
            Some(record) => {
                records.insert(code.clone(), record);
            }
            None => debug!("Skipping {}: no advisory object", code),
        }
    }
    Ok(records)
}

/// Normalize one entry, or `None` if it carries no advisory object.
pub fn normalize_entry(code: &str, item: &Value) -> Option<SafetyRecord> {
    let advisory = item.get("advisory").filter(|a| a.is_object())?;

    let name = item.get("name").and_then(Value::as_str).unwrap_or_default();
    let score = advisory.get("score").map(coerce_score).unwrap_or(0.0);
    let message = advisory
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let updated = advisory.get("updated").and_then(updated_marker);

    Some(SafetyRecord::new(code, name, score, message, updated))
}

/// Best-effort numeric coercion; anything unreadable becomes 0.
///
/// Strings are read by their longest leading decimal prefix, exponent
/// included, so `"3.5 (est.)"` reads as 3.5 and `"1e1"` as 10.
pub fn coerce_score(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => leading_float(s),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn leading_float(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }

    if !seen_digit {
        return None;
    }

    // Optional exponent, kept only when it has at least one digit.
    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > digits_start {
            end = exp_end;
        }
    }
    s[..end].parse().ok()
}

fn updated_marker(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AdvisoryLevel;
    use serde_json::json;

    #[test]
    fn test_france_scenario() {
        let body = json!({
            "data": {
                "fr": {"name": "France", "advisory": {"score": 4.8, "message": "m", "updated": "2024-01-01"}}
            }
        });

        let records = normalize_body(&body).unwrap();
        let fr = &records["fr"];
        assert_eq!(fr.code, "fr");
        assert_eq!(fr.display_name, "France");
        assert_eq!(fr.raw_score, 4.8);
        assert_eq!(fr.level, AdvisoryLevel::Extreme);
        assert_eq!(fr.message, "m");
        assert_eq!(fr.updated_at.as_deref(), Some("2024-01-01"));

        let wire = serde_json::to_value(fr).unwrap();
        assert_eq!(wire["level"], "Extreme Risk");
    }

    #[test]
    fn test_missing_advisory_is_isolated() {
        let body = json!({
            "data": {
                "fr": {"name": "France", "advisory": {"score": 2.5, "message": "ok"}},
                "xx": {"name": "Nowhere"},
                "yy": {"name": "Bad", "advisory": "not an object"},
                "de": {"name": "Germany", "advisory": {"score": 1.2}}
            }
        });

        let records = normalize_body(&body).unwrap();
        assert_eq!(records.len(), 2);
        assert!(!records.contains_key("xx"));
        assert!(!records.contains_key("yy"));
        assert_eq!(records["fr"].level, AdvisoryLevel::Medium);
        assert_eq!(records["de"].message, "");
        assert_eq!(records["de"].updated_at, None);
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        for body in [json!([]), json!({"data": []}), json!({"status": "ok"}), json!({"data": null})] {
            let err = normalize_body(&body).unwrap_err();
            assert!(matches!(err, Error::MalformedPayload(_)), "{}", body);
        }
    }

    #[test]
    fn test_empty_data_is_valid() {
        let records = normalize_body(&json!({"data": {}})).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_coerce_score() {
        assert_eq!(coerce_score(&json!(3.2)), 3.2);
        assert_eq!(coerce_score(&json!(4)), 4.0);
        assert_eq!(coerce_score(&json!("4.5")), 4.5);
        assert_eq!(coerce_score(&json!(" 3.5 (est.)")), 3.5);
        assert_eq!(coerce_score(&json!("n/a")), 0.0);
        assert_eq!(coerce_score(&json!("")), 0.0);
        assert_eq!(coerce_score(&json!(null)), 0.0);
        assert_eq!(coerce_score(&json!({"v": 1})), 0.0);
    }

    #[test]
    fn test_coerce_score_exponents() {
        assert_eq!(coerce_score(&json!("1e1")), 10.0);
        assert_eq!(coerce_score(&json!("2.5E-1 approx")), 0.25);
        assert_eq!(coerce_score(&json!("4e+0")), 4.0);
        // A dangling exponent marker is not part of the number.
        assert_eq!(coerce_score(&json!("3e")), 3.0);
        assert_eq!(coerce_score(&json!("3e-x")), 3.0);
    }

    #[test]
    fn test_non_numeric_score_defaults_to_low() {
        let record = normalize_entry("zz", &json!({"name": "Z", "advisory": {"score": "unknown"}})).unwrap();
        assert_eq!(record.raw_score, 0.0);
        assert_eq!(record.level, AdvisoryLevel::Low);
    }

    #[test]
    fn test_non_string_updated_marker_is_kept() {
        let record =
            normalize_entry("zz", &json!({"advisory": {"score": 1, "updated": 1704067200}})).unwrap();
        assert_eq!(record.updated_at.as_deref(), Some("1704067200"));
        assert_eq!(record.display_name, "");
    }
}

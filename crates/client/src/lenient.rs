//! Tolerant numeric decoding for vendor payloads.
//!
//! Government APIs report numbers as JSON numbers, plain strings, strings
//! with thousands separators, or suppression markers like `(NA)`, `(D)`, `-`.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Parse vendor text as a finite number; markers and junk become None.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Deserialize an optional number from a number, a numeric string, or null.
pub fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<NumberOrText>::deserialize(deserializer)?;
    Ok(match value {
        Some(NumberOrText::Number(n)) if n.is_finite() => Some(n),
        Some(NumberOrText::Text(text)) => parse_number(&text),
        _ => None,
    })
}

/// Deserialize an optional year from `2024` or `"2024"`.
pub fn opt_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_f64(deserializer)?.filter(|y| y.fract() == 0.0).map(|y| y as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "opt_f64")]
        value: Option<f64>,
        #[serde(default, deserialize_with = "opt_year")]
        year: Option<i32>,
    }

    fn value(json: &str) -> Option<f64> {
        serde_json::from_str::<Row>(json).unwrap().value
    }

    #[test]
    fn test_number_forms() {
        assert_eq!(value(r#"{"value": 3.5}"#), Some(3.5));
        assert_eq!(value(r#"{"value": "87.9"}"#), Some(87.9));
        assert_eq!(value(r#"{"value": "1,234.5"}"#), Some(1234.5));
    }

    #[test]
    fn test_markers_and_missing() {
        assert_eq!(value(r#"{"value": "(NA)"}"#), None);
        assert_eq!(value(r#"{"value": "(D)"}"#), None);
        assert_eq!(value(r#"{"value": "-"}"#), None);
        assert_eq!(value(r#"{"value": null}"#), None);
        assert_eq!(value(r#"{}"#), None);
    }

    #[test]
    fn test_year_forms() {
        let row: Row = serde_json::from_str(r#"{"year": "2024"}"#).unwrap();
        assert_eq!(row.year, Some(2024));
        let row: Row = serde_json::from_str(r#"{"year": 2023}"#).unwrap();
        assert_eq!(row.year, Some(2023));
    }
}

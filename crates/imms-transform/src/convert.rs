//! Type coercions applied during batch-to-FHIR conversion.
//!
//! Each function returns the converted value where possible and passes the
//! original string through unchanged otherwise. A value that fails to convert
//! becomes a downstream validation failure, never a converter error.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use imms_model::fhir_gender;

/// `YYYYMMDD` to `YYYY-MM-DD`, calendar-checked.
pub fn date(raw: &str) -> Value {
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Value::String(raw.to_string());
    }
    match NaiveDate::parse_from_str(raw, "%Y%m%d") {
        Ok(parsed) => Value::String(parsed.format("%Y-%m-%d").to_string()),
        Err(_) => Value::String(raw.to_string()),
    }
}

/// `YYYYMMDDThhmmss[00|01]` to ISO-8601 with an explicit offset.
///
/// A `00` suffix is UTC, `01` is BST; no suffix defaults to UTC.
pub fn date_time(raw: &str) -> Value {
    let (stem, offset) = match raw.len() {
        15 => (raw, "+00:00"),
        17 if raw.ends_with("00") => (&raw[..15], "+00:00"),
        17 if raw.ends_with("01") => (&raw[..15], "+01:00"),
        _ => return Value::String(raw.to_string()),
    };
    match NaiveDateTime::parse_from_str(stem, "%Y%m%dT%H%M%S") {
        Ok(parsed) => Value::String(format!(
            "{}{offset}",
            parsed.format("%Y-%m-%dT%H:%M:%S")
        )),
        Err(_) => Value::String(raw.to_string()),
    }
}

/// Batch gender code to FHIR administrative gender.
pub fn gender_code(raw: &str) -> Value {
    match fhir_gender(raw) {
        Some(gender) => Value::String(gender.to_string()),
        None => Value::String(raw.to_string()),
    }
}

/// `true`/`false` (case-insensitive) to a JSON boolean.
pub fn boolean(raw: &str) -> Value {
    match raw.to_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

/// Numeric string to a JSON integer when there is no decimal point, else an
/// arbitrary-precision JSON number. Dose amounts must never be rounded
/// through `f64`.
pub fn integer_or_decimal(raw: &str) -> Value {
    if let Ok(int) = raw.parse::<i64>() {
        return Value::Number(int.into());
    }
    match raw.parse::<serde_json::Number>() {
        Ok(number) => Value::Number(number),
        Err(_) => Value::String(raw.to_string()),
    }
}

/// Numeric string to a JSON integer; pass-through otherwise.
pub fn integer(raw: &str) -> Value {
    match raw.parse::<i64>() {
        Ok(int) => Value::Number(int.into()),
        Err(_) => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn date_converts_valid_values() {
        assert_eq!(date("19930821"), json!("1993-08-21"));
        assert_eq!(date("20240229"), json!("2024-02-29"));
    }

    #[test]
    fn date_passes_through_invalid_values() {
        assert_eq!(date("20230229"), json!("20230229")); // not a leap year
        assert_eq!(date("2023-08-21"), json!("2023-08-21"));
        assert_eq!(date("202308"), json!("202308"));
    }

    #[test]
    fn date_time_defaults_to_utc() {
        assert_eq!(
            date_time("20240101T120000"),
            json!("2024-01-01T12:00:00+00:00")
        );
    }

    #[test]
    fn date_time_honours_timezone_suffix() {
        assert_eq!(
            date_time("20240101T12000000"),
            json!("2024-01-01T12:00:00+00:00")
        );
        assert_eq!(
            date_time("20240601T09300001"),
            json!("2024-06-01T09:30:00+01:00")
        );
    }

    #[test]
    fn date_time_passes_through_invalid_values() {
        assert_eq!(date_time("20240101T256000"), json!("20240101T256000"));
        assert_eq!(date_time("20240101T12000002"), json!("20240101T12000002"));
        assert_eq!(date_time("not a datetime"), json!("not a datetime"));
    }

    #[test]
    fn boolean_is_case_insensitive() {
        assert_eq!(boolean("true"), json!(true));
        assert_eq!(boolean("FALSE"), json!(false));
        assert_eq!(boolean("yes"), json!("yes"));
    }

    #[test]
    fn integer_or_decimal_keeps_precision() {
        assert_eq!(integer_or_decimal("3"), json!(3));
        let value = integer_or_decimal("0.5");
        assert_eq!(value.to_string(), "0.5");
        let value = integer_or_decimal("1.2345");
        assert_eq!(value.to_string(), "1.2345");
        assert_eq!(integer_or_decimal("half"), json!("half"));
    }

    #[test]
    fn gender_code_maps_known_codes() {
        assert_eq!(gender_code("1"), json!("male"));
        assert_eq!(gender_code("0"), json!("unknown"));
        assert_eq!(gender_code("5"), json!("5"));
    }
}

//! Value-format checks applied on top of mandation.
//!
//! All checks are string-based: numeric precision is inspected on the
//! literal text so a dose amount is never rounded through a float.

use chrono::{DateTime, FixedOffset, Utc};

/// FHIR administrative-gender values accepted at this layer, matching the
/// closed batch code set `{1,2,9,0}`.
pub const FHIR_GENDERS: [&str; 4] = ["male", "female", "other", "unknown"];

pub const MAX_DOSE_AMOUNT_DECIMAL_PLACES: usize = 4;
pub const MAX_POSTCODE_LENGTH: usize = 8;
pub const MAX_REPORT_ORIGIN_LENGTH: usize = 100;

/// Whether a numeric string has at most `max` digits after the decimal
/// point. A string without a decimal point always passes; a non-numeric
/// string is not this check's concern and also passes.
pub fn max_decimal_places(raw: &str, max: usize) -> bool {
    match raw.split_once('.') {
        Some((_, fraction)) => fraction.len() <= max,
        None => true,
    }
}

pub fn valid_gender(value: &str) -> bool {
    FHIR_GENDERS.contains(&value)
}

/// Postcode length limit, spaces stripped before counting.
pub fn postcode_within_limit(value: &str) -> bool {
    value.chars().filter(|c| !c.is_whitespace()).count() <= MAX_POSTCODE_LENGTH
}

/// Exactly ten digits after space-stripping.
pub fn nhs_number_is_ten_digits(value: &str) -> bool {
    let stripped: Vec<char> = value.chars().filter(|c| *c != ' ').collect();
    stripped.len() == 10 && stripped.iter().all(char::is_ascii_digit)
}

/// Mod-11 checksum over the first nine digits with weights 10 down to 2.
///
/// Returns false on checksum mismatch and on any input that is not ten
/// digits; it never errors. This is the stronger check applied at the
/// record-API layer, distinct from the ten-digit shape check above.
pub fn nhs_number_mod11_check(value: &str) -> bool {
    let digits: Vec<u32> = value.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 10 || value.chars().any(|c| !c.is_ascii_digit()) {
        return false;
    }
    let weighted: u32 = digits[..9]
        .iter()
        .zip((2..=10).rev())
        .map(|(digit, weight)| digit * weight)
        .sum();
    let check = match 11 - (weighted % 11) {
        11 => 0,
        10 => return false,
        n => n,
    };
    digits[9] == check
}

pub fn report_origin_within_limit(value: &str) -> bool {
    value.chars().count() <= MAX_REPORT_ORIGIN_LENGTH
}

/// Whether an ISO-8601 occurrence datetime lies at or before `now`.
/// Unparseable strings pass; their shape is caught elsewhere.
pub fn occurrence_not_in_future(value: &str, now: DateTime<Utc>) -> bool {
    match DateTime::<FixedOffset>::parse_from_rfc3339(value) {
        Ok(parsed) => parsed.with_timezone(&Utc) <= now,
        Err(_) => true,
    }
}

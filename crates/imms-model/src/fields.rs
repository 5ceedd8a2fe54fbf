//! Batch CSV field names and row access.

use std::collections::BTreeMap;

/// The exact ordered header row expected in every batch source file.
/// A file whose header row differs from this list fails file-level validation.
pub const EXPECTED_HEADERS: [&str; 41] = [
    "NHS_NUMBER",
    "PERSON_FORENAME",
    "PERSON_SURNAME",
    "PERSON_DOB",
    "PERSON_GENDER_CODE",
    "PERSON_POSTCODE",
    "DATE_AND_TIME",
    "SITE_CODE",
    "SITE_CODE_TYPE_URI",
    "UNIQUE_ID",
    "UNIQUE_ID_URI",
    "ACTION_FLAG",
    "PERFORMING_PROFESSIONAL_FORENAME",
    "PERFORMING_PROFESSIONAL_SURNAME",
    "RECORDED_DATE",
    "PRIMARY_SOURCE",
    "REPORT_ORIGIN",
    "NOT_GIVEN",
    "REASON_NOT_GIVEN_CODE",
    "REASON_NOT_GIVEN_TERM",
    "VACCINATION_PROCEDURE_CODE",
    "VACCINATION_PROCEDURE_TERM",
    "VACCINATION_SITUATION_CODE",
    "VACCINATION_SITUATION_TERM",
    "DOSE_SEQUENCE",
    "VACCINE_PRODUCT_CODE",
    "VACCINE_PRODUCT_TERM",
    "VACCINE_MANUFACTURER",
    "BATCH_NUMBER",
    "EXPIRY_DATE",
    "SITE_OF_VACCINATION_CODE",
    "SITE_OF_VACCINATION_TERM",
    "ROUTE_OF_VACCINATION_CODE",
    "ROUTE_OF_VACCINATION_TERM",
    "DOSE_AMOUNT",
    "DOSE_UNIT_CODE",
    "DOSE_UNIT_TERM",
    "INDICATION_CODE",
    "INDICATION_TERM",
    "LOCATION_CODE",
    "LOCATION_CODE_TYPE_URI",
];

/// One parsed data row: upper-case header name to raw cell value.
///
/// Values are stored as read from the file; trimming and coercion happen
/// downstream in the converter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRow {
    values: BTreeMap<String, String>,
}

impl BatchRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.values.insert(field.into(), value.into());
    }

    /// Raw cell value for a field, or `""` when the column is absent.
    pub fn get(&self, field: &str) -> &str {
        self.values.get(field).map_or("", String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

//! File key validation and supplier identification.
//!
//! Batch files arrive named
//! `{VaccineType}_Vaccinations_v5_{OdsCode}_{Timestamp}.csv`. Everything a
//! downstream stage needs to route the file is carried in the key, so the
//! key is validated in full before anything is read.

use chrono::NaiveDateTime;

use imms_model::VaccineType;

use crate::error::BatchError;

/// ODS code to supplier name. An ODS code outside this table is invalid for
/// the service.
pub const ODS_TO_SUPPLIER_MAPPINGS: [(&str, &str); 17] = [
    ("YGM41", "EMIS"),
    ("8J1100001", "PINNACLE"),
    ("8HK48", "SONAR"),
    ("YGA", "TPP"),
    ("0DE", "AGEM-NIVS"),
    ("0DF", "NIMS"),
    ("8HA94", "EVA"),
    ("X26", "RAVS"),
    ("YGMYH", "MEDICAL_DIRECTOR"),
    ("W00", "WELSH_DA_1"),
    ("W000", "WELSH_DA_2"),
    ("ZT001", "NORTHERN_IRELAND_DA"),
    ("YA7", "SCOTLAND_DA"),
    ("N2N9I", "COVID19_VACCINE_RESOLUTION_SERVICEDESK"),
    ("YGJ", "EMIS"),
    ("DPSREDUCED", "DPSREDUCED"),
    ("DPSFULL", "DPSFULL"),
];

/// The supplier behind an ODS code (case-insensitive), if whitelisted.
pub fn identify_supplier(ods_code: &str) -> Option<&'static str> {
    let upper = ods_code.to_uppercase();
    ODS_TO_SUPPLIER_MAPPINGS
        .iter()
        .find(|(code, _)| *code == upper)
        .map(|(_, supplier)| *supplier)
}

/// A fully validated batch file key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileKey {
    pub key: String,
    pub vaccine: VaccineType,
    pub supplier: &'static str,
    pub ods_code: String,
    pub timestamp: String,
}

impl FileKey {
    /// The audit queue this file belongs to: one queue per supplier and
    /// vaccine type.
    pub fn queue_name(&self) -> String {
        format!("{}_{}", self.supplier, self.vaccine)
    }
}

/// Whether the timestamp token starts with a structurally valid
/// `yyyyMMddTHHmmss`. Characters after the seconds (usually a two-digit
/// timezone marker) are not validated.
fn is_valid_timestamp(timestamp: &str) -> bool {
    timestamp
        .get(..15)
        .is_some_and(|prefix| NaiveDateTime::parse_from_str(prefix, "%Y%m%dT%H%M%S").is_ok())
}

/// Validate every element of a batch file key.
pub fn validate_file_key(key: &str) -> Result<FileKey, BatchError> {
    let invalid = || BatchError::InvalidFileKey(key.to_string());

    // Exactly five underscore-separated parts and a single extension.
    let (stem, extension) = key.split_once('.').ok_or_else(invalid)?;
    if extension.contains('.') {
        return Err(invalid());
    }
    let parts: Vec<&str> = stem.split('_').collect();
    let [vaccine_part, vaccinations, version, ods_code, timestamp] = parts[..] else {
        return Err(invalid());
    };

    let vaccine: VaccineType = vaccine_part.parse().map_err(|_| invalid())?;
    let supplier = identify_supplier(ods_code).ok_or_else(invalid)?;

    if !vaccinations.eq_ignore_ascii_case("Vaccinations")
        || !version.eq_ignore_ascii_case("v5")
        || !is_valid_timestamp(timestamp)
        || !(extension.eq_ignore_ascii_case("csv") || extension.eq_ignore_ascii_case("dat"))
    {
        return Err(invalid());
    }

    Ok(FileKey {
        key: key.to_string(),
        vaccine,
        supplier,
        ods_code: ods_code.to_uppercase(),
        timestamp: timestamp.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_key_resolves_vaccine_and_supplier() {
        let file_key = validate_file_key("Flu_Vaccinations_v5_YGM41_20240708T12130100.csv").unwrap();
        assert_eq!(file_key.vaccine, VaccineType::Flu);
        assert_eq!(file_key.supplier, "EMIS");
        assert_eq!(file_key.queue_name(), "EMIS_FLU");
    }

    #[test]
    fn casing_is_forgiving_for_vaccine_and_tokens() {
        assert!(validate_file_key("RSV_VACCINATIONS_V5_X26_20240708T12130100.CSV").is_ok());
        assert!(validate_file_key("covid19_vaccinations_v5_DPSFULL_20240708T12130100.dat").is_ok());
    }

    #[test]
    fn wrong_version_rejected() {
        assert!(validate_file_key("Flu_Vaccinations_v4_YGM41_20240708T12130100.csv").is_err());
    }

    #[test]
    fn unknown_vaccine_or_ods_rejected() {
        assert!(
            validate_file_key("InvalidVaccineType_Vaccinations_v5_YGM41_20240708T12130100.csv")
                .is_err()
        );
        assert!(validate_file_key("Flu_Vaccinations_v5_NOPE_20240708T12130100.csv").is_err());
    }

    #[test]
    fn malformed_shapes_rejected() {
        assert!(validate_file_key("Flu_Vaccination_v5_YGM41_20240708T12130100.csv").is_err());
        assert!(validate_file_key("Flu_Vaccinations_v5_20240708T12130100.csv").is_err());
        assert!(validate_file_key("Flu_Vaccinations_v5_YGM41_20240708T12130100").is_err());
        assert!(validate_file_key("Flu_Vaccinations_v5_YGM41_20240708T12130100.tar.csv").is_err());
        assert!(validate_file_key("Flu_Vaccinations_v5_YGM41_20240708T12130100.txt").is_err());
    }

    #[test]
    fn timestamp_must_be_a_real_datetime() {
        // Day 32 does not exist; trailing timezone digits are not validated.
        assert!(validate_file_key("Flu_Vaccinations_v5_YGM41_20240732T12130100.csv").is_err());
        assert!(validate_file_key("Flu_Vaccinations_v5_YGM41_20240708T121301.csv").is_ok());
        assert!(validate_file_key("Flu_Vaccinations_v5_YGM41_20240708T121301xx.csv").is_ok());
    }
}

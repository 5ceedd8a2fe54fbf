//! The converter's output must satisfy the mandation rules when the source
//! row is complete and well-formed.

use chrono::{TimeZone, Utc};
use imms_model::{BatchRow, VaccineType};
use imms_transform::convert_to_immunization;
use imms_validate::validate_at;

fn valid_rsv_row() -> BatchRow {
    BatchRow::from_pairs([
        ("NHS_NUMBER", "9990548609"),
        ("PERSON_FORENAME", "Mary"),
        ("PERSON_SURNAME", "Taylor"),
        ("PERSON_DOB", "19840101"),
        ("PERSON_GENDER_CODE", "2"),
        ("PERSON_POSTCODE", "EC1A 1BB"),
        ("DATE_AND_TIME", "20240904T183325"),
        ("SITE_CODE", "RVVKC"),
        ("SITE_CODE_TYPE_URI", "https://fhir.nhs.uk/Id/ods-organization-code"),
        ("UNIQUE_ID", "0001_RSV_v5_Run3_valid_dose_1"),
        ("UNIQUE_ID_URI", "https://www.ravs.england.nhs.uk/"),
        ("ACTION_FLAG", "new"),
        ("RECORDED_DATE", "20240904"),
        ("PRIMARY_SOURCE", "TRUE"),
        ("VACCINATION_PROCEDURE_CODE", "1303503001"),
        ("DOSE_SEQUENCE", "1"),
        ("DOSE_AMOUNT", "0.5"),
        ("DOSE_UNIT_CODE", "258773002"),
        ("DOSE_UNIT_TERM", "Milliliter"),
        ("LOCATION_CODE", "RJC02"),
        ("LOCATION_CODE_TYPE_URI", "https://fhir.nhs.uk/Id/ods-organization-code"),
    ])
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

#[test]
fn complete_row_converts_and_validates() {
    let imms = convert_to_immunization(&valid_rsv_row(), VaccineType::Rsv);
    assert_eq!(validate_at(&imms, now()).unwrap(), VaccineType::Rsv);
}

#[test]
fn dose_amount_precision_survives_conversion() {
    let mut row = valid_rsv_row();
    row.set("DOSE_AMOUNT", "1.2345");
    let imms = convert_to_immunization(&row, VaccineType::Rsv);
    assert!(validate_at(&imms, now()).is_ok());

    row.set("DOSE_AMOUNT", "1.23456");
    let imms = convert_to_immunization(&row, VaccineType::Rsv);
    let report = validate_at(&imms, now()).unwrap_err();
    assert!(
        report
            .messages()
            .any(|m| m == "doseQuantity.value must have at most 4 decimal places")
    );
}

#[test]
fn not_done_row_validates_with_situation_fields() {
    let mut row = valid_rsv_row();
    row.set("NOT_GIVEN", "not-done");
    row.set("REASON_NOT_GIVEN_CODE", "310376006");
    row.set("REASON_NOT_GIVEN_TERM", "Immunization consent not given");
    row.set("VACCINATION_SITUATION_CODE", "1324741000000101");

    let imms = convert_to_immunization(&row, VaccineType::Rsv);
    assert_eq!(validate_at(&imms, now()).unwrap(), VaccineType::Rsv);
}

#[test]
fn missing_patient_fields_fail_with_located_messages() {
    let mut row = valid_rsv_row();
    row.set("PERSON_DOB", "");
    row.set("PERSON_POSTCODE", "");
    let imms = convert_to_immunization(&row, VaccineType::Rsv);
    let report = validate_at(&imms, now()).unwrap_err();
    let messages: Vec<&str> = report.messages().collect();
    assert!(messages.contains(
        &"contained[?(@.resourceType=='Patient')].birthDate is a mandatory field"
    ));
    assert!(messages.contains(
        &"contained[?(@.resourceType=='Patient')].address[0].postalCode is a mandatory field"
    ));
}

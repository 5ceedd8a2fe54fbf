//! The mandation rule engine.
//!
//! Validation is two-phase: vaccine-type resolution first (every other
//! rule's applicability depends on it, so a failure there is immediate),
//! then a full pass over every validated field that collects all
//! violations before reporting.

use chrono::{DateTime, Utc};
use serde_json::Value;

use imms_model::{ImmsStatus, MandationRule, ValidatedField, VaccineType};

use crate::accessor;
use crate::checks;
use crate::report::ValidationReport;

/// Validate one Immunization resource against the mandation table and the
/// format checks, using the current time for the occurrence check.
pub fn validate(imms: &Value) -> Result<VaccineType, ValidationReport> {
    validate_at(imms, Utc::now())
}

/// As [`validate`], with the clock injected.
pub fn validate_at(imms: &Value, now: DateTime<Utc>) -> Result<VaccineType, ValidationReport> {
    let mut report = ValidationReport::new();

    let codes = accessor::target_disease_codes(imms);
    let vaccine = match VaccineType::from_disease_codes(&codes) {
        Ok(vaccine) => vaccine,
        Err(err) => {
            report.push_record(err.to_string());
            return Err(report);
        }
    };

    let status = imms.get("status").and_then(Value::as_str);
    let not_done = match status.map(str::parse::<ImmsStatus>) {
        Some(Ok(status)) => status == ImmsStatus::NotDone,
        _ => {
            report.push_record(
                "status must be one of 'completed', 'entered-in-error', 'not-done'",
            );
            false
        }
    };
    let primary_source_false =
        accessor::extract(imms, ValidatedField::PrimarySource) == Some(&Value::Bool(false));
    let gates = Gates {
        not_done,
        primary_source_false,
    };

    for field in ValidatedField::ALL {
        if field.is_repeated() {
            // The rule applies to every element, with one pass against an
            // empty list so a list-level mandatory violation still surfaces.
            let passes = accessor::reason_code_len(imms).max(1);
            for index in 0..passes {
                let present = reason_code_value(imms, field, index).is_some();
                apply_rule(&mut report, field, vaccine, gates, present);
            }
        } else {
            let value = accessor::extract(imms, field);
            apply_rule(&mut report, field, vaccine, gates, value.is_some());
            if let Some(value) = value {
                check_value(&mut report, field, value, now);
            }
        }
    }

    if report.is_empty() {
        Ok(vaccine)
    } else {
        tracing::debug!(violations = report.len(), "record failed validation");
        Err(report)
    }
}

#[derive(Clone, Copy)]
struct Gates {
    not_done: bool,
    primary_source_false: bool,
}

fn reason_code_value(imms: &Value, field: ValidatedField, index: usize) -> Option<&Value> {
    let part = match field {
        ValidatedField::ReasonCodeCodingCode => "code",
        _ => "display",
    };
    accessor::reason_code_part(imms, index, part)
}

fn apply_rule(
    report: &mut ValidationReport,
    field: ValidatedField,
    vaccine: VaccineType,
    gates: Gates,
    present: bool,
) {
    match field.rule(vaccine) {
        MandationRule::Mandatory => {
            if !present {
                report.push(field, format!("{} is a mandatory field", field.location()));
            }
        }
        MandationRule::Required | MandationRule::Optional => {}
        MandationRule::NotApplicable => {
            if present {
                report.push(
                    field,
                    format!(
                        "{} must not be provided for this vaccine type",
                        field.location()
                    ),
                );
            }
        }
        MandationRule::ConditionalMandatory => apply_gate(report, field, gates, present),
    }
}

/// Resolve a conditionally mandatory field: present if and only if its gate
/// holds, with a message naming the gate either way.
fn apply_gate(report: &mut ValidationReport, field: ValidatedField, gates: Gates, present: bool) {
    let (mandatory, when, unless) = match field {
        ValidatedField::ReportOrigin => (
            gates.primary_source_false,
            "primarySource is false",
            "primarySource is false",
        ),
        ValidatedField::VaccinationProcedureCode => (
            !gates.not_done,
            "the vaccination was administered",
            "the vaccination was administered",
        ),
        ValidatedField::VaccinationSituationCode
        | ValidatedField::StatusReasonCode
        | ValidatedField::StatusReasonDisplay => (
            gates.not_done,
            "status is 'not-done'",
            "status is 'not-done'",
        ),
        // The rule table marks no other field conditional.
        _ => return,
    };

    if mandatory && !present {
        report.push(
            field,
            format!("{} is mandatory when {when}", field.location()),
        );
    } else if !mandatory && present {
        report.push(
            field,
            format!("{} must not be provided unless {unless}", field.location()),
        );
    }
}

/// Format checks on present values. A non-string where a string is checked
/// is left to schema-level validation.
fn check_value(
    report: &mut ValidationReport,
    field: ValidatedField,
    value: &Value,
    now: DateTime<Utc>,
) {
    match field {
        ValidatedField::PatientGender => {
            if let Some(gender) = value.as_str()
                && !checks::valid_gender(gender)
            {
                report.push(
                    field,
                    format!(
                        "{} must be one of 'male', 'female', 'other', 'unknown'",
                        field.location()
                    ),
                );
            }
        }
        ValidatedField::PatientPostalCode => {
            if let Some(postcode) = value.as_str()
                && !checks::postcode_within_limit(postcode)
            {
                report.push(
                    field,
                    format!(
                        "{} must be at most {} characters excluding spaces",
                        field.location(),
                        checks::MAX_POSTCODE_LENGTH
                    ),
                );
            }
        }
        ValidatedField::PatientIdentifierValue => {
            if let Some(nhs_number) = value.as_str()
                && !checks::nhs_number_is_ten_digits(nhs_number)
            {
                report.push(
                    field,
                    format!("{} must be 10 digits", field.location()),
                );
            }
        }
        ValidatedField::DoseQuantityValue => {
            // Arbitrary-precision numbers render their literal text, so the
            // decimal-place count is taken from the source string either way.
            let literal = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if !checks::max_decimal_places(&literal, checks::MAX_DOSE_AMOUNT_DECIMAL_PLACES) {
                report.push(
                    field,
                    format!(
                        "{} must have at most {} decimal places",
                        field.location(),
                        checks::MAX_DOSE_AMOUNT_DECIMAL_PLACES
                    ),
                );
            }
        }
        ValidatedField::OccurrenceDateTime => {
            if let Some(occurrence) = value.as_str()
                && !checks::occurrence_not_in_future(occurrence, now)
            {
                report.push(
                    field,
                    format!("{} must not be in the future", field.location()),
                );
            }
        }
        ValidatedField::ReportOrigin => {
            if let Some(text) = value.as_str()
                && !checks::report_origin_within_limit(text)
            {
                report.push(
                    field,
                    format!(
                        "{} must be at most {} characters",
                        field.location(),
                        checks::MAX_REPORT_ORIGIN_LENGTH
                    ),
                );
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn minimal_valid() -> Value {
        json!({
            "resourceType": "Immunization",
            "status": "completed",
            "contained": [{
                "resourceType": "Patient",
                "id": "Patient1",
                "name": [{"family": "Taylor", "given": ["Mary"]}],
                "birthDate": "1984-01-01",
                "gender": "female",
                "address": [{"postalCode": "EC1A 1BB"}],
            }],
            "extension": [{
                "url": imms_model::mandation::VACCINATION_PROCEDURE_URL,
                "valueCodeableConcept": {"coding": [{
                    "system": imms_model::mandation::SNOMED_URL,
                    "code": "1303503001",
                }]},
            }],
            "occurrenceDateTime": "2024-09-04T18:33:25+00:00",
            "recorded": "2024-09-04",
            "primarySource": true,
            "identifier": [{"value": "0001", "system": "https://www.ravs.england.nhs.uk/"}],
            "performer": [{"actor": {
                "type": "Organization",
                "identifier": {"system": "https://fhir.nhs.uk/Id/ods-organization-code", "value": "RVVKC"},
            }}],
            "location": {"type": "Location", "identifier": {
                "value": "RJC02", "system": "https://fhir.nhs.uk/Id/ods-organization-code",
            }},
            "protocolApplied": [{"targetDisease": [
                {"coding": [{"system": imms_model::mandation::SNOMED_URL, "code": "55735004"}]},
            ]}],
        })
    }

    fn messages(report: &ValidationReport) -> Vec<&str> {
        report.messages().collect()
    }

    #[test]
    fn minimal_valid_record_passes() {
        let result = validate_at(&minimal_valid(), fixed_now());
        assert_eq!(result.unwrap(), VaccineType::Rsv);
    }

    #[test]
    fn unknown_disease_codes_fail_immediately() {
        let imms = json!({
            "status": "completed",
            "protocolApplied": [{"targetDisease": [
                {"coding": [{"system": imms_model::mandation::SNOMED_URL, "code": "000000000"}]},
            ]}],
        });
        let report = validate_at(&imms, fixed_now()).unwrap_err();
        // Resolution failure short-circuits: no per-field noise.
        assert_eq!(report.len(), 1);
        assert!(messages(&report)[0].contains("not a valid combination of disease codes"));
    }

    #[test]
    fn missing_mandatory_fields_are_all_reported() {
        let mut imms = minimal_valid();
        imms.as_object_mut().unwrap().remove("recorded");
        imms.as_object_mut().unwrap().remove("identifier");
        let report = validate_at(&imms, fixed_now()).unwrap_err();
        let found = messages(&report);
        assert!(found.contains(&"recorded is a mandatory field"));
        assert!(found.contains(&"identifier[0].value is a mandatory field"));
        assert!(found.contains(&"identifier[0].system is a mandatory field"));
    }

    #[test]
    fn report_origin_gated_on_primary_source() {
        let mut imms = minimal_valid();
        imms["primarySource"] = json!(false);
        let report = validate_at(&imms, fixed_now()).unwrap_err();
        assert!(
            messages(&report)
                .contains(&"reportOrigin.text is mandatory when primarySource is false")
        );

        imms["primarySource"] = json!(true);
        imms["reportOrigin"] = json!({"text": "a GP practice"});
        let report = validate_at(&imms, fixed_now()).unwrap_err();
        assert!(
            messages(&report)
                .contains(&"reportOrigin.text must not be provided unless primarySource is false")
        );
    }

    #[test]
    fn not_done_swaps_procedure_for_situation() {
        let mut imms = minimal_valid();
        imms["status"] = json!("not-done");
        let report = validate_at(&imms, fixed_now()).unwrap_err();
        let found = messages(&report);
        assert!(found.iter().any(|m| m.contains("VaccinationSituation")
            && m.contains("is mandatory when status is 'not-done'")));
        assert!(found.iter().any(|m| m.contains("VaccinationProcedure")
            && m.contains("must not be provided")));
        assert!(found.iter().any(|m| m.starts_with("statusReason.coding")));
    }

    #[test]
    fn dose_amount_decimal_places() {
        let mut imms = minimal_valid();
        imms["doseQuantity"] = json!({"value": 1.2345, "unit": "ml", "code": "258773002"});
        assert!(validate_at(&imms, fixed_now()).is_ok());

        imms["doseQuantity"]["value"] =
            serde_json::from_str::<Value>("1.23456").unwrap();
        let report = validate_at(&imms, fixed_now()).unwrap_err();
        assert!(
            messages(&report)
                .contains(&"doseQuantity.value must have at most 4 decimal places")
        );
    }

    #[test]
    fn future_occurrence_rejected() {
        let mut imms = minimal_valid();
        imms["occurrenceDateTime"] = json!("2025-06-01T00:00:00+00:00");
        let report = validate_at(&imms, fixed_now()).unwrap_err();
        assert!(messages(&report).contains(&"occurrenceDateTime must not be in the future"));
    }

    #[test]
    fn invalid_gender_and_long_postcode() {
        let mut imms = minimal_valid();
        imms["contained"][0]["gender"] = json!("5");
        imms["contained"][0]["address"][0]["postalCode"] = json!("AB12 34CDE");
        let report = validate_at(&imms, fixed_now()).unwrap_err();
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn nhs_number_shape_checked_when_present() {
        let mut imms = minimal_valid();
        imms["contained"][0]["identifier"] =
            json!([{"system": imms_model::mandation::NHS_NUMBER_URL, "value": "12345"}]);
        let report = validate_at(&imms, fixed_now()).unwrap_err();
        assert!(messages(&report).iter().any(|m| m.ends_with("must be 10 digits")));
    }
}

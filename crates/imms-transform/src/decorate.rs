//! Section decorators building the FHIR Immunization resource.
//!
//! Each decorator adds the fields for one section of the resource. They are
//! order independent and add nothing when their section's cells are all
//! empty. The public entry point is [`convert_to_immunization`].

use serde_json::{Map, Value, json};

use imms_model::mandation::{
    NHS_NUMBER_URL, VACCINATION_PROCEDURE_URL, VACCINATION_SITUATION_URL,
};
use imms_model::{BatchRow, NotGivenFlag, VaccineType};

use crate::build::{
    add_converted, add_item, add_object, add_singleton_list, add_snomed, any_populated,
    extension_item, object_of, snomed_concept,
};
use crate::convert;

const UCUM_URL: &str = "http://unitsofmeasure.org";

/// Convert one batch row into a FHIR Immunization resource.
///
/// Pure and deterministic: the same row and vaccine type always produce the
/// same JSON. Values that fail coercion are carried through unchanged and
/// surface later as validation failures.
pub fn convert_to_immunization(row: &BatchRow, vaccine: VaccineType) -> Value {
    // An unparseable NOT_GIVEN defaults to "given" here; the flag itself is
    // validated at the row boundary.
    let not_given =
        NotGivenFlag::parse(row.get("NOT_GIVEN")).unwrap_or(NotGivenFlag::Given);

    let mut imms = Map::new();
    imms.insert(
        "resourceType".to_string(),
        Value::String("Immunization".to_string()),
    );
    imms.insert(
        "status".to_string(),
        Value::String(not_given.status().as_str().to_string()),
    );

    let mut contained: Vec<Value> = Vec::new();

    decorate_immunization(&mut imms, row, not_given);
    decorate_patient(&mut imms, &mut contained, row);
    decorate_vaccine(&mut imms, row);
    decorate_vaccination(&mut imms, row, not_given);
    decorate_performer(&mut imms, &mut contained, row);
    decorate_protocol_applied(&mut imms, row, vaccine);

    if !contained.is_empty() {
        imms.insert("contained".to_string(), Value::Array(contained));
    }

    Value::Object(imms)
}

/// Fields belonging to the immunization object itself: status reason,
/// reason for vaccination, recorded date and the business identifier.
fn decorate_immunization(
    imms: &mut Map<String, Value>,
    row: &BatchRow,
    not_given: NotGivenFlag,
) {
    // statusReason only applies when the vaccination did not take place.
    if not_given.is_not_given() {
        let reason_code = row.get("REASON_NOT_GIVEN_CODE");
        let reason_term = row.get("REASON_NOT_GIVEN_TERM");
        if any_populated(&[reason_code, reason_term]) {
            imms.insert(
                "statusReason".to_string(),
                snomed_concept(reason_code, reason_term),
            );
        }
    }

    // reasonCode is the reason for vaccination, distinct from statusReason.
    let indication_code = row.get("INDICATION_CODE");
    let indication_term = row.get("INDICATION_TERM");
    if any_populated(&[indication_code, indication_term]) {
        imms.insert(
            "reasonCode".to_string(),
            Value::Array(vec![object_of(&[(
                "coding",
                Value::Array(vec![object_of(&[
                    ("code", Value::String(indication_code.to_string())),
                    ("display", Value::String(indication_term.to_string())),
                ])]),
            )])]),
        );
    }

    add_converted(imms, "recorded", row.get("RECORDED_DATE"), convert::date);

    add_singleton_list(
        imms,
        "identifier",
        &[
            ("value", Value::String(row.get("UNIQUE_ID").to_string())),
            ("system", Value::String(row.get("UNIQUE_ID_URI").to_string())),
        ],
    );
}

/// The contained Patient resource and its reference.
fn decorate_patient(imms: &mut Map<String, Value>, contained: &mut Vec<Value>, row: &BatchRow) {
    let nhs_number = row.get("NHS_NUMBER");
    let surname = row.get("PERSON_SURNAME");
    let forename = row.get("PERSON_FORENAME");
    let gender = row.get("PERSON_GENDER_CODE");
    let dob = row.get("PERSON_DOB");
    let postcode = row.get("PERSON_POSTCODE");

    if !any_populated(&[nhs_number, surname, forename, gender, dob, postcode]) {
        return;
    }

    let internal_id = "Patient1";
    imms.insert("patient".to_string(), json!({"reference": format!("#{internal_id}")}));

    let mut patient = Map::new();
    patient.insert("id".to_string(), Value::String(internal_id.to_string()));
    patient.insert(
        "resourceType".to_string(),
        Value::String("Patient".to_string()),
    );

    add_converted(&mut patient, "birthDate", dob, convert::date);
    add_converted(&mut patient, "gender", gender, convert::gender_code);
    add_singleton_list(
        &mut patient,
        "address",
        &[("postalCode", Value::String(postcode.to_string()))],
    );

    if any_populated(&[surname, forename]) {
        let mut name = Map::new();
        add_item(&mut name, "family", Value::String(surname.to_string()));
        if !forename.is_empty() {
            name.insert(
                "given".to_string(),
                Value::Array(vec![Value::String(forename.to_string())]),
            );
        }
        patient.insert("name".to_string(), Value::Array(vec![Value::Object(name)]));
    }

    if !nhs_number.is_empty() {
        patient.insert(
            "identifier".to_string(),
            json!([{"system": NHS_NUMBER_URL, "value": nhs_number}]),
        );
    }

    contained.push(Value::Object(patient));
}

/// The physical vaccine product: code, manufacturer, expiry and batch.
fn decorate_vaccine(imms: &mut Map<String, Value>, row: &BatchRow) {
    add_snomed(
        imms,
        "vaccineCode",
        row.get("VACCINE_PRODUCT_CODE"),
        row.get("VACCINE_PRODUCT_TERM"),
    );
    add_object(
        imms,
        "manufacturer",
        &[(
            "display",
            Value::String(row.get("VACCINE_MANUFACTURER").to_string()),
        )],
    );
    add_converted(imms, "expirationDate", row.get("EXPIRY_DATE"), convert::date);
    add_item(
        imms,
        "lotNumber",
        Value::String(row.get("BATCH_NUMBER").to_string()),
    );
}

/// The administration itself: procedure/situation extension, occurrence,
/// primary source, report origin, site, route and dose quantity.
fn decorate_vaccination(
    imms: &mut Map<String, Value>,
    row: &BatchRow,
    not_given: NotGivenFlag,
) {
    // The procedure and situation extensions are mutually exclusive: a
    // vaccination that did not take place carries the situation coding, an
    // administered one carries the procedure coding.
    let (url, code, term) = if not_given.is_not_given() {
        (
            VACCINATION_SITUATION_URL,
            row.get("VACCINATION_SITUATION_CODE"),
            row.get("VACCINATION_SITUATION_TERM"),
        )
    } else {
        (
            VACCINATION_PROCEDURE_URL,
            row.get("VACCINATION_PROCEDURE_CODE"),
            row.get("VACCINATION_PROCEDURE_TERM"),
        )
    };
    if any_populated(&[code, term]) {
        imms.insert(
            "extension".to_string(),
            Value::Array(vec![extension_item(
                url,
                imms_model::mandation::SNOMED_URL,
                code,
                term,
            )]),
        );
    }

    add_converted(
        imms,
        "occurrenceDateTime",
        row.get("DATE_AND_TIME"),
        convert::date_time,
    );
    add_converted(
        imms,
        "primarySource",
        row.get("PRIMARY_SOURCE"),
        convert::boolean,
    );
    add_object(
        imms,
        "reportOrigin",
        &[("text", Value::String(row.get("REPORT_ORIGIN").to_string()))],
    );
    add_snomed(
        imms,
        "site",
        row.get("SITE_OF_VACCINATION_CODE"),
        row.get("SITE_OF_VACCINATION_TERM"),
    );
    add_snomed(
        imms,
        "route",
        row.get("ROUTE_OF_VACCINATION_CODE"),
        row.get("ROUTE_OF_VACCINATION_TERM"),
    );

    let dose_amount = row.get("DOSE_AMOUNT");
    let dose_unit_term = row.get("DOSE_UNIT_TERM");
    let dose_unit_code = row.get("DOSE_UNIT_CODE");
    if any_populated(&[dose_amount, dose_unit_term, dose_unit_code]) {
        imms.insert(
            "doseQuantity".to_string(),
            object_of(&[
                ("value", convert::integer_or_decimal(dose_amount)),
                ("unit", Value::String(dose_unit_term.to_string())),
                ("system", Value::String(UCUM_URL.to_string())),
                ("code", Value::String(dose_unit_code.to_string())),
            ]),
        );
    }
}

/// The performing organization, the contained Practitioner and the location.
fn decorate_performer(imms: &mut Map<String, Value>, contained: &mut Vec<Value>, row: &BatchRow) {
    let site_code_uri = row.get("SITE_CODE_TYPE_URI");
    let site_code = row.get("SITE_CODE");
    let prof_surname = row.get("PERFORMING_PROFESSIONAL_SURNAME");
    let prof_forename = row.get("PERFORMING_PROFESSIONAL_FORENAME");

    let organization_populated = any_populated(&[site_code_uri, site_code]);
    let practitioner_populated = any_populated(&[prof_surname, prof_forename]);

    if organization_populated || practitioner_populated {
        let mut performer: Vec<Value> = Vec::new();

        if organization_populated {
            let mut actor = Map::new();
            actor.insert("type".to_string(), Value::String("Organization".to_string()));
            add_object(
                &mut actor,
                "identifier",
                &[
                    ("system", Value::String(site_code_uri.to_string())),
                    ("value", Value::String(site_code.to_string())),
                ],
            );
            performer.push(json!({"actor": Value::Object(actor)}));
        }

        if practitioner_populated {
            let internal_id = "Practitioner1";
            let mut practitioner = Map::new();
            practitioner.insert(
                "resourceType".to_string(),
                Value::String("Practitioner".to_string()),
            );
            practitioner.insert("id".to_string(), Value::String(internal_id.to_string()));

            let mut name = Map::new();
            add_item(&mut name, "family", Value::String(prof_surname.to_string()));
            if !prof_forename.is_empty() {
                name.insert(
                    "given".to_string(),
                    Value::Array(vec![Value::String(prof_forename.to_string())]),
                );
            }
            practitioner.insert("name".to_string(), Value::Array(vec![Value::Object(name)]));

            performer.push(json!({"actor": {"reference": format!("#{internal_id}")}}));
            contained.push(Value::Object(practitioner));
        }

        imms.insert("performer".to_string(), Value::Array(performer));
    }

    let location_code = row.get("LOCATION_CODE");
    let location_uri = row.get("LOCATION_CODE_TYPE_URI");
    if any_populated(&[location_code, location_uri]) {
        imms.insert(
            "location".to_string(),
            json!({
                "type": "Location",
                "identifier": object_of(&[
                    ("value", Value::String(location_code.to_string())),
                    ("system", Value::String(location_uri.to_string())),
                ]),
            }),
        );
    }
}

/// protocolApplied: the target-disease element derived from the vaccine type
/// plus the dose sequence.
fn decorate_protocol_applied(imms: &mut Map<String, Value>, row: &BatchRow, vaccine: VaccineType) {
    let target_disease: Vec<Value> = vaccine
        .diseases()
        .iter()
        .map(|disease| {
            json!({
                "coding": [{
                    "system": imms_model::mandation::SNOMED_URL,
                    "code": disease.code(),
                    "display": disease.display(),
                }]
            })
        })
        .collect();

    let mut protocol = Map::new();
    protocol.insert("targetDisease".to_string(), Value::Array(target_disease));
    add_converted(
        &mut protocol,
        "doseNumberPositiveInt",
        row.get("DOSE_SEQUENCE"),
        convert::integer,
    );

    imms.insert(
        "protocolApplied".to_string(),
        Value::Array(vec![Value::Object(protocol)]),
    );
}

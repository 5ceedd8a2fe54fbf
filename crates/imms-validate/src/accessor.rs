//! Read-only field access into an Immunization resource.
//!
//! Every accessor returns `Option`: an absent containing structure (missing
//! contained resource, extension URL not found, out-of-range index) is
//! `None`, never an error. The engine turns `None` into a mandation
//! violation or not depending on the field's rule.

use serde_json::Value;

use imms_model::ValidatedField;
use imms_model::mandation::{
    SNOMED_URL, VACCINATION_PROCEDURE_URL, VACCINATION_SITUATION_URL,
};

/// The first contained resource of the given type.
pub fn contained_resource<'a>(imms: &'a Value, resource_type: &str) -> Option<&'a Value> {
    imms.get("contained")?
        .as_array()?
        .iter()
        .find(|resource| resource.get("resourceType").and_then(Value::as_str) == Some(resource_type))
}

/// The first coding element whose `system` matches, from a codeable concept.
pub fn coding_by_system<'a>(concept: &'a Value, system: &str) -> Option<&'a Value> {
    concept
        .get("coding")?
        .as_array()?
        .iter()
        .find(|coding| coding.get("system").and_then(Value::as_str) == Some(system))
}

/// The codeable-concept value of the extension with the given URL.
pub fn extension_concept<'a>(imms: &'a Value, url: &str) -> Option<&'a Value> {
    imms.get("extension")?
        .as_array()?
        .iter()
        .find(|item| item.get("url").and_then(Value::as_str) == Some(url))?
        .get("valueCodeableConcept")
}

/// The actor of the first performer whose actor type is `Organization`.
fn organization_actor(imms: &Value) -> Option<&Value> {
    imms.get("performer")?
        .as_array()?
        .iter()
        .map(|performer| performer.get("actor"))
        .find(|actor| {
            actor.is_some_and(|a| a.get("type").and_then(Value::as_str) == Some("Organization"))
        })?
}

fn snomed_extension_part<'a>(imms: &'a Value, url: &str, part: &str) -> Option<&'a Value> {
    coding_by_system(extension_concept(imms, url)?, SNOMED_URL)?.get(part)
}

fn snomed_concept_part<'a>(imms: &'a Value, key: &str, part: &str) -> Option<&'a Value> {
    coding_by_system(imms.get(key)?, SNOMED_URL)?.get(part)
}

/// The value at a validated field's location, if the whole path resolves.
pub fn extract(imms: &Value, field: ValidatedField) -> Option<&Value> {
    use ValidatedField::*;

    match field {
        PatientIdentifierValue => contained_resource(imms, "Patient")?
            .get("identifier")?
            .get(0)?
            .get("value"),
        PatientNameGiven => contained_resource(imms, "Patient")?
            .get("name")?
            .get(0)?
            .get("given"),
        PatientNameFamily => contained_resource(imms, "Patient")?
            .get("name")?
            .get(0)?
            .get("family"),
        PatientBirthDate => contained_resource(imms, "Patient")?.get("birthDate"),
        PatientGender => contained_resource(imms, "Patient")?.get("gender"),
        PatientPostalCode => contained_resource(imms, "Patient")?
            .get("address")?
            .get(0)?
            .get("postalCode"),
        OccurrenceDateTime => imms.get("occurrenceDateTime"),
        OrganizationIdentifierValue => organization_actor(imms)?.get("identifier")?.get("value"),
        OrganizationIdentifierSystem => organization_actor(imms)?.get("identifier")?.get("system"),
        IdentifierValue => imms.get("identifier")?.get(0)?.get("value"),
        IdentifierSystem => imms.get("identifier")?.get(0)?.get("system"),
        PractitionerNameGiven => contained_resource(imms, "Practitioner")?
            .get("name")?
            .get(0)?
            .get("given"),
        PractitionerNameFamily => contained_resource(imms, "Practitioner")?
            .get("name")?
            .get(0)?
            .get("family"),
        Recorded => imms.get("recorded"),
        PrimarySource => imms.get("primarySource"),
        ReportOrigin => imms.get("reportOrigin")?.get("text"),
        VaccinationProcedureCode => {
            snomed_extension_part(imms, VACCINATION_PROCEDURE_URL, "code")
        }
        VaccinationProcedureDisplay => {
            snomed_extension_part(imms, VACCINATION_PROCEDURE_URL, "display")
        }
        VaccinationSituationCode => {
            snomed_extension_part(imms, VACCINATION_SITUATION_URL, "code")
        }
        VaccinationSituationDisplay => {
            snomed_extension_part(imms, VACCINATION_SITUATION_URL, "display")
        }
        StatusReasonCode => snomed_concept_part(imms, "statusReason", "code"),
        StatusReasonDisplay => snomed_concept_part(imms, "statusReason", "display"),
        DoseNumberPositiveInt => imms
            .get("protocolApplied")?
            .get(0)?
            .get("doseNumberPositiveInt"),
        VaccineCodeCodingCode => snomed_concept_part(imms, "vaccineCode", "code"),
        VaccineCodeCodingDisplay => snomed_concept_part(imms, "vaccineCode", "display"),
        ManufacturerDisplay => imms.get("manufacturer")?.get("display"),
        LotNumber => imms.get("lotNumber"),
        ExpirationDate => imms.get("expirationDate"),
        SiteCodingCode => snomed_concept_part(imms, "site", "code"),
        SiteCodingDisplay => snomed_concept_part(imms, "site", "display"),
        RouteCodingCode => snomed_concept_part(imms, "route", "code"),
        RouteCodingDisplay => snomed_concept_part(imms, "route", "display"),
        DoseQuantityValue => imms.get("doseQuantity")?.get("value"),
        DoseQuantityCode => imms.get("doseQuantity")?.get("code"),
        DoseQuantityUnit => imms.get("doseQuantity")?.get("unit"),
        // Repeated fields default to the first element here; the engine walks
        // the full list itself.
        ReasonCodeCodingCode => reason_code_part(imms, 0, "code"),
        ReasonCodeCodingDisplay => reason_code_part(imms, 0, "display"),
        LocationIdentifierValue => imms.get("location")?.get("identifier")?.get("value"),
        LocationIdentifierSystem => imms.get("location")?.get("identifier")?.get("system"),
    }
}

/// One part of the coding of the `index`-th reasonCode element.
pub fn reason_code_part<'a>(imms: &'a Value, index: usize, part: &str) -> Option<&'a Value> {
    imms.get("reasonCode")?
        .get(index)?
        .get("coding")?
        .get(0)?
        .get(part)
}

/// Number of reasonCode elements, zero when the list is absent.
pub fn reason_code_len(imms: &Value) -> usize {
    imms.get("reasonCode")
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

/// The SNOMED target-disease codes of `protocolApplied[0]`, in file order.
pub fn target_disease_codes(imms: &Value) -> Vec<&str> {
    let Some(diseases) = imms
        .get("protocolApplied")
        .and_then(|p| p.get(0))
        .and_then(|p| p.get("targetDisease"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };
    diseases
        .iter()
        .filter_map(|concept| coding_by_system(concept, SNOMED_URL))
        .filter_map(|coding| coding.get("code").and_then(Value::as_str))
        .collect()
}

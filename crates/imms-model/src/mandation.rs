//! Mandation rules: the applicability level of each validated field.
//!
//! Rules are resolved per (field, vaccine type) from a closed table, then
//! narrowed by the validation engine for fields whose applicability depends
//! on another field (primarySource, status). The rule set is a closed enum
//! so every rule has a compile-time-checked handler.

use serde::{Deserialize, Serialize};

use crate::vaccine::VaccineType;

/// The applicability level of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MandationRule {
    /// Value must be present; absence is a violation.
    Mandatory,
    /// Value should be present but absence is tolerated.
    Required,
    /// Value may be present or absent.
    Optional,
    /// Mandatory if and only if a gating condition holds; the engine
    /// resolves the gate and substitutes Mandatory or Optional.
    ConditionalMandatory,
    /// Value must be absent; presence is a violation.
    NotApplicable,
}

/// Every field under standard mandation validation.
///
/// Each field carries the JSON-path-like location string used in error
/// messages, including predicate filters where the field lives inside a
/// contained resource or a system-filtered coding list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidatedField {
    PatientIdentifierValue,
    PatientNameGiven,
    PatientNameFamily,
    PatientBirthDate,
    PatientGender,
    PatientPostalCode,
    OccurrenceDateTime,
    OrganizationIdentifierValue,
    OrganizationIdentifierSystem,
    IdentifierValue,
    IdentifierSystem,
    PractitionerNameGiven,
    PractitionerNameFamily,
    Recorded,
    PrimarySource,
    ReportOrigin,
    VaccinationProcedureCode,
    VaccinationProcedureDisplay,
    VaccinationSituationCode,
    VaccinationSituationDisplay,
    StatusReasonCode,
    StatusReasonDisplay,
    DoseNumberPositiveInt,
    VaccineCodeCodingCode,
    VaccineCodeCodingDisplay,
    ManufacturerDisplay,
    LotNumber,
    ExpirationDate,
    SiteCodingCode,
    SiteCodingDisplay,
    RouteCodingCode,
    RouteCodingDisplay,
    DoseQuantityValue,
    DoseQuantityCode,
    DoseQuantityUnit,
    ReasonCodeCodingCode,
    ReasonCodeCodingDisplay,
    LocationIdentifierValue,
    LocationIdentifierSystem,
}

pub const VACCINATION_PROCEDURE_URL: &str =
    "https://fhir.hl7.org.uk/StructureDefinition/Extension-UKCore-VaccinationProcedure";
pub const VACCINATION_SITUATION_URL: &str =
    "https://fhir.hl7.org.uk/StructureDefinition/Extension-UKCore-VaccinationSituation";
pub const SNOMED_URL: &str = "http://snomed.info/sct";
pub const NHS_NUMBER_URL: &str = "https://fhir.nhs.uk/Id/nhs-number";

impl ValidatedField {
    pub const ALL: [ValidatedField; 39] = [
        ValidatedField::PatientIdentifierValue,
        ValidatedField::PatientNameGiven,
        ValidatedField::PatientNameFamily,
        ValidatedField::PatientBirthDate,
        ValidatedField::PatientGender,
        ValidatedField::PatientPostalCode,
        ValidatedField::OccurrenceDateTime,
        ValidatedField::OrganizationIdentifierValue,
        ValidatedField::OrganizationIdentifierSystem,
        ValidatedField::IdentifierValue,
        ValidatedField::IdentifierSystem,
        ValidatedField::PractitionerNameGiven,
        ValidatedField::PractitionerNameFamily,
        ValidatedField::Recorded,
        ValidatedField::PrimarySource,
        ValidatedField::ReportOrigin,
        ValidatedField::VaccinationProcedureCode,
        ValidatedField::VaccinationProcedureDisplay,
        ValidatedField::VaccinationSituationCode,
        ValidatedField::VaccinationSituationDisplay,
        ValidatedField::StatusReasonCode,
        ValidatedField::StatusReasonDisplay,
        ValidatedField::DoseNumberPositiveInt,
        ValidatedField::VaccineCodeCodingCode,
        ValidatedField::VaccineCodeCodingDisplay,
        ValidatedField::ManufacturerDisplay,
        ValidatedField::LotNumber,
        ValidatedField::ExpirationDate,
        ValidatedField::SiteCodingCode,
        ValidatedField::SiteCodingDisplay,
        ValidatedField::RouteCodingCode,
        ValidatedField::RouteCodingDisplay,
        ValidatedField::DoseQuantityValue,
        ValidatedField::DoseQuantityCode,
        ValidatedField::DoseQuantityUnit,
        ValidatedField::ReasonCodeCodingCode,
        ValidatedField::ReasonCodeCodingDisplay,
        ValidatedField::LocationIdentifierValue,
        ValidatedField::LocationIdentifierSystem,
    ];

    /// The field-location string for error messages. This is the path an
    /// implementer would use to locate the field in the FHIR JSON.
    pub fn location(self) -> &'static str {
        match self {
            ValidatedField::PatientIdentifierValue => {
                "contained[?(@.resourceType=='Patient')].identifier[0].value"
            }
            ValidatedField::PatientNameGiven => {
                "contained[?(@.resourceType=='Patient')].name[0].given"
            }
            ValidatedField::PatientNameFamily => {
                "contained[?(@.resourceType=='Patient')].name[0].family"
            }
            ValidatedField::PatientBirthDate => {
                "contained[?(@.resourceType=='Patient')].birthDate"
            }
            ValidatedField::PatientGender => "contained[?(@.resourceType=='Patient')].gender",
            ValidatedField::PatientPostalCode => {
                "contained[?(@.resourceType=='Patient')].address[0].postalCode"
            }
            ValidatedField::OccurrenceDateTime => "occurrenceDateTime",
            ValidatedField::OrganizationIdentifierValue => {
                "performer[?(@.actor.type=='Organization')].actor.identifier.value"
            }
            ValidatedField::OrganizationIdentifierSystem => {
                "performer[?(@.actor.type=='Organization')].actor.identifier.system"
            }
            ValidatedField::IdentifierValue => "identifier[0].value",
            ValidatedField::IdentifierSystem => "identifier[0].system",
            ValidatedField::PractitionerNameGiven => {
                "contained[?(@.resourceType=='Practitioner')].name[0].given"
            }
            ValidatedField::PractitionerNameFamily => {
                "contained[?(@.resourceType=='Practitioner')].name[0].family"
            }
            ValidatedField::Recorded => "recorded",
            ValidatedField::PrimarySource => "primarySource",
            ValidatedField::ReportOrigin => "reportOrigin.text",
            ValidatedField::VaccinationProcedureCode => {
                "extension[?(@.url=='https://fhir.hl7.org.uk/StructureDefinition/Extension-UKCore-VaccinationProcedure')].valueCodeableConcept.coding[?(@.system=='http://snomed.info/sct')].code"
            }
            ValidatedField::VaccinationProcedureDisplay => {
                "extension[?(@.url=='https://fhir.hl7.org.uk/StructureDefinition/Extension-UKCore-VaccinationProcedure')].valueCodeableConcept.coding[?(@.system=='http://snomed.info/sct')].display"
            }
            ValidatedField::VaccinationSituationCode => {
                "extension[?(@.url=='https://fhir.hl7.org.uk/StructureDefinition/Extension-UKCore-VaccinationSituation')].valueCodeableConcept.coding[?(@.system=='http://snomed.info/sct')].code"
            }
            ValidatedField::VaccinationSituationDisplay => {
                "extension[?(@.url=='https://fhir.hl7.org.uk/StructureDefinition/Extension-UKCore-VaccinationSituation')].valueCodeableConcept.coding[?(@.system=='http://snomed.info/sct')].display"
            }
            ValidatedField::StatusReasonCode => {
                "statusReason.coding[?(@.system=='http://snomed.info/sct')].code"
            }
            ValidatedField::StatusReasonDisplay => {
                "statusReason.coding[?(@.system=='http://snomed.info/sct')].display"
            }
            ValidatedField::DoseNumberPositiveInt => "protocolApplied[0].doseNumberPositiveInt",
            ValidatedField::VaccineCodeCodingCode => {
                "vaccineCode.coding[?(@.system=='http://snomed.info/sct')].code"
            }
            ValidatedField::VaccineCodeCodingDisplay => {
                "vaccineCode.coding[?(@.system=='http://snomed.info/sct')].display"
            }
            ValidatedField::ManufacturerDisplay => "manufacturer.display",
            ValidatedField::LotNumber => "lotNumber",
            ValidatedField::ExpirationDate => "expirationDate",
            ValidatedField::SiteCodingCode => {
                "site.coding[?(@.system=='http://snomed.info/sct')].code"
            }
            ValidatedField::SiteCodingDisplay => {
                "site.coding[?(@.system=='http://snomed.info/sct')].display"
            }
            ValidatedField::RouteCodingCode => {
                "route.coding[?(@.system=='http://snomed.info/sct')].code"
            }
            ValidatedField::RouteCodingDisplay => {
                "route.coding[?(@.system=='http://snomed.info/sct')].display"
            }
            ValidatedField::DoseQuantityValue => "doseQuantity.value",
            ValidatedField::DoseQuantityCode => "doseQuantity.code",
            ValidatedField::DoseQuantityUnit => "doseQuantity.unit",
            ValidatedField::ReasonCodeCodingCode => "reasonCode[0].coding[0].code",
            ValidatedField::ReasonCodeCodingDisplay => "reasonCode[0].coding[0].display",
            ValidatedField::LocationIdentifierValue => "location.identifier.value",
            ValidatedField::LocationIdentifierSystem => "location.identifier.system",
        }
    }

    /// The base mandation rule for this field and vaccine type, before any
    /// interdependent-field gating.
    ///
    /// All currently supported vaccine types share the agnostic rule set. A
    /// vaccine type with bespoke rules gets its own match arm here.
    pub fn rule(self, _vaccine: VaccineType) -> MandationRule {
        match self {
            ValidatedField::PatientNameGiven
            | ValidatedField::PatientNameFamily
            | ValidatedField::PatientBirthDate
            | ValidatedField::PatientGender
            | ValidatedField::PatientPostalCode
            | ValidatedField::OccurrenceDateTime
            | ValidatedField::OrganizationIdentifierValue
            | ValidatedField::OrganizationIdentifierSystem
            | ValidatedField::IdentifierValue
            | ValidatedField::IdentifierSystem
            | ValidatedField::Recorded
            | ValidatedField::PrimarySource
            | ValidatedField::LocationIdentifierValue
            | ValidatedField::LocationIdentifierSystem => MandationRule::Mandatory,

            ValidatedField::ReportOrigin
            | ValidatedField::VaccinationProcedureCode
            | ValidatedField::VaccinationSituationCode
            | ValidatedField::StatusReasonCode
            | ValidatedField::StatusReasonDisplay => MandationRule::ConditionalMandatory,

            ValidatedField::PractitionerNameGiven | ValidatedField::PractitionerNameFamily => {
                MandationRule::Optional
            }

            ValidatedField::PatientIdentifierValue
            | ValidatedField::VaccinationProcedureDisplay
            | ValidatedField::VaccinationSituationDisplay
            | ValidatedField::DoseNumberPositiveInt
            | ValidatedField::VaccineCodeCodingCode
            | ValidatedField::VaccineCodeCodingDisplay
            | ValidatedField::ManufacturerDisplay
            | ValidatedField::LotNumber
            | ValidatedField::ExpirationDate
            | ValidatedField::SiteCodingCode
            | ValidatedField::SiteCodingDisplay
            | ValidatedField::RouteCodingCode
            | ValidatedField::RouteCodingDisplay
            | ValidatedField::DoseQuantityValue
            | ValidatedField::DoseQuantityCode
            | ValidatedField::DoseQuantityUnit
            | ValidatedField::ReasonCodeCodingCode
            | ValidatedField::ReasonCodeCodingDisplay => MandationRule::Required,
        }
    }

    /// Whether the field is repeated: the rule applies independently to every
    /// element of the containing list.
    pub fn is_repeated(self) -> bool {
        matches!(
            self,
            ValidatedField::ReasonCodeCodingCode | ValidatedField::ReasonCodeCodingDisplay
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_field_has_a_rule_for_every_vaccine() {
        for field in ValidatedField::ALL {
            for vaccine in VaccineType::ALL {
                // Must not panic, and conditional fields stay conditional
                // across vaccine types.
                let _ = field.rule(vaccine);
            }
        }
    }

    #[test]
    fn all_lists_each_field_once() {
        let mut seen = std::collections::BTreeSet::new();
        for field in ValidatedField::ALL {
            assert!(seen.insert(field.location()), "duplicate field {field:?}");
        }
    }

    #[test]
    fn conditional_fields() {
        assert_eq!(
            ValidatedField::ReportOrigin.rule(VaccineType::Covid19),
            MandationRule::ConditionalMandatory
        );
        assert_eq!(
            ValidatedField::VaccinationSituationCode.rule(VaccineType::Rsv),
            MandationRule::ConditionalMandatory
        );
        assert_eq!(
            ValidatedField::VaccinationProcedureCode.rule(VaccineType::Flu),
            MandationRule::ConditionalMandatory
        );
    }

    #[test]
    fn locations_include_predicate_filters() {
        assert_eq!(
            ValidatedField::PatientIdentifierValue.location(),
            "contained[?(@.resourceType=='Patient')].identifier[0].value"
        );
        assert!(
            ValidatedField::VaccineCodeCodingCode
                .location()
                .contains("(@.system=='http://snomed.info/sct')")
        );
    }
}

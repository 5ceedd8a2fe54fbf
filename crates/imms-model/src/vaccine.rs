//! Vaccine type classification.
//!
//! A vaccine type is derived from the set of SNOMED target-disease codes on a
//! record. The mapping is injective and exhaustive: any code set outside the
//! table below is rejected, and a record with no target-disease codes at all
//! is a mandatory-field failure.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::vocab::Operation;

/// A disease targeted by one of the supported vaccines.
///
/// Codes are drawn from the IPS target-diseases value set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disease {
    Covid19,
    Flu,
    Hpv,
    Measles,
    Mumps,
    Rubella,
    Rsv,
}

impl Disease {
    /// SNOMED code for the disease.
    pub fn code(self) -> &'static str {
        match self {
            Disease::Covid19 => "840539006",
            Disease::Flu => "6142004",
            Disease::Hpv => "240532009",
            Disease::Measles => "14189004",
            Disease::Mumps => "36989005",
            Disease::Rubella => "36653000",
            Disease::Rsv => "55735004",
        }
    }

    /// Display term corresponding to the SNOMED code.
    pub fn display(self) -> &'static str {
        match self {
            Disease::Covid19 => {
                "Disease caused by severe acute respiratory syndrome coronavirus 2"
            }
            Disease::Flu => "Influenza",
            Disease::Hpv => "Human papillomavirus infection",
            Disease::Measles => "Measles",
            Disease::Mumps => "Mumps",
            Disease::Rubella => "Rubella",
            Disease::Rsv => "Respiratory syncytial virus infection (disorder)",
        }
    }
}

/// Classification of an immunization record, derived from its target diseases.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum VaccineType {
    Covid19,
    Flu,
    Hpv,
    Mmr,
    Rsv,
}

impl VaccineType {
    pub const ALL: [VaccineType; 5] = [
        VaccineType::Covid19,
        VaccineType::Flu,
        VaccineType::Hpv,
        VaccineType::Mmr,
        VaccineType::Rsv,
    ];

    /// Upper-case wire form, as used in file keys and permission strings.
    pub fn as_str(self) -> &'static str {
        match self {
            VaccineType::Covid19 => "COVID19",
            VaccineType::Flu => "FLU",
            VaccineType::Hpv => "HPV",
            VaccineType::Mmr => "MMR",
            VaccineType::Rsv => "RSV",
        }
    }

    /// The diseases this vaccine targets.
    pub fn diseases(self) -> &'static [Disease] {
        match self {
            VaccineType::Covid19 => &[Disease::Covid19],
            VaccineType::Flu => &[Disease::Flu],
            VaccineType::Hpv => &[Disease::Hpv],
            VaccineType::Mmr => &[Disease::Measles, Disease::Mumps, Disease::Rubella],
            VaccineType::Rsv => &[Disease::Rsv],
        }
    }

    /// Resolve the vaccine type from a list of target-disease codes.
    ///
    /// Comparison is order-insensitive: both sides are sorted before being
    /// compared, so suppliers may list MMR diseases in any order.
    pub fn from_disease_codes<S: AsRef<str>>(codes: &[S]) -> Result<Self, ModelError> {
        if codes.is_empty() {
            return Err(ModelError::MissingTargetDisease);
        }
        let mut sorted: Vec<&str> = codes.iter().map(AsRef::as_ref).collect();
        sorted.sort_unstable();

        for vaccine in Self::ALL {
            let mut expected: Vec<&str> =
                vaccine.diseases().iter().map(|d| d.code()).collect();
            expected.sort_unstable();
            if expected == sorted {
                return Ok(vaccine);
            }
        }
        Err(ModelError::InvalidDiseaseCodeCombination(sorted.join(", ")))
    }

    /// Permission key granting one operation for this vaccine type.
    pub fn operation_permission(self, operation: Operation) -> String {
        format!("{}_{}", self.as_str(), operation.as_str())
    }

    /// Permission key granting all operations for this vaccine type.
    pub fn full_permission(self) -> String {
        format!("{}_FULL", self.as_str())
    }
}

impl fmt::Display for VaccineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VaccineType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == upper)
            .ok_or_else(|| ModelError::InvalidVaccineType(s.to_string()))
    }
}

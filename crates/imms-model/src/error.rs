use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("[{0}] is not a valid combination of disease codes for this service")]
    InvalidDiseaseCodeCombination(String),

    #[error("No target disease codes found")]
    MissingTargetDisease,

    #[error("'{0}' is not a valid vaccine type")]
    InvalidVaccineType(String),

    #[error("ACTION_FLAG is missing or is not in the set 'NEW', 'UPDATE', 'DELETE'")]
    InvalidActionFlag,

    #[error("NOT_GIVEN flag should be 'empty' or 'not-done'")]
    InvalidNotGivenFlag,

    #[error("'{0}' is not a valid status")]
    InvalidStatus(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;

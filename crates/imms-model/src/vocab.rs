//! Closed vocabularies used by the batch pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// The requested row operation, as supplied in the ACTION_FLAG column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionFlag {
    New,
    Update,
    Delete,
}

impl ActionFlag {
    /// Parse an ACTION_FLAG value, case-insensitively. Anything outside the
    /// NEW/UPDATE/DELETE set is rejected.
    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        match raw.trim().to_uppercase().as_str() {
            "NEW" => Ok(ActionFlag::New),
            "UPDATE" => Ok(ActionFlag::Update),
            "DELETE" => Ok(ActionFlag::Delete),
            _ => Err(ModelError::InvalidActionFlag),
        }
    }

    /// The store operation this flag requests (NEW maps to CREATE).
    pub fn operation(self) -> Operation {
        match self {
            ActionFlag::New => Operation::Create,
            ActionFlag::Update => Operation::Update,
            ActionFlag::Delete => Operation::Delete,
        }
    }
}

/// A record store operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Operation::Create, Operation::Update, Operation::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// FHIR Immunization status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImmsStatus {
    Completed,
    EnteredInError,
    NotDone,
}

impl ImmsStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ImmsStatus::Completed => "completed",
            ImmsStatus::EnteredInError => "entered-in-error",
            ImmsStatus::NotDone => "not-done",
        }
    }
}

impl fmt::Display for ImmsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImmsStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(ImmsStatus::Completed),
            "entered-in-error" => Ok(ImmsStatus::EnteredInError),
            "not-done" => Ok(ImmsStatus::NotDone),
            other => Err(ModelError::InvalidStatus(other.to_string())),
        }
    }
}

/// The NOT_GIVEN flag, recording whether the vaccine was administered.
///
/// Exactly two non-blank values are valid: `not-done` (the vaccination did
/// not take place) and `empty` (it did). A blank cell is treated the same as
/// `empty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotGivenFlag {
    Given,
    NotGiven,
}

impl NotGivenFlag {
    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        match raw.trim() {
            "" | "empty" => Ok(NotGivenFlag::Given),
            "not-done" => Ok(NotGivenFlag::NotGiven),
            _ => Err(ModelError::InvalidNotGivenFlag),
        }
    }

    /// True when the vaccine was not administered.
    pub fn is_not_given(self) -> bool {
        matches!(self, NotGivenFlag::NotGiven)
    }

    /// The Immunization status implied by this flag.
    pub fn status(self) -> ImmsStatus {
        match self {
            NotGivenFlag::Given => ImmsStatus::Completed,
            NotGivenFlag::NotGiven => ImmsStatus::NotDone,
        }
    }
}

/// Map a batch gender code to the FHIR administrative gender.
///
/// The code set is closed: only 1, 2, 9 and 0 are recognised.
pub fn fhir_gender(code: &str) -> Option<&'static str> {
    match code {
        "1" => Some("male"),
        "2" => Some("female"),
        "9" => Some("other"),
        "0" => Some("unknown"),
        _ => None,
    }
}

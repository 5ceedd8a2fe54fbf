#![deny(unsafe_code)]

//! Core domain types for the immunization batch pipeline.

pub mod error;
pub mod fields;
pub mod mandation;
pub mod vaccine;
pub mod vocab;

pub use error::{ModelError, Result};
pub use fields::{BatchRow, EXPECTED_HEADERS};
pub use mandation::{MandationRule, ValidatedField};
pub use vaccine::{Disease, VaccineType};
pub use vocab::{ActionFlag, ImmsStatus, NotGivenFlag, Operation, fhir_gender};

#![deny(unsafe_code)]

//! Mandation-rule validation of FHIR Immunization resources.
//!
//! The entry point is [`validate`]: vaccine-type resolution, the per-field
//! mandation table with its conditional gates, and the value-format checks,
//! all aggregated into a single [`ValidationReport`].

pub mod accessor;
pub mod checks;
pub mod engine;
pub mod report;

pub use engine::{validate, validate_at};
pub use report::{ValidationReport, Violation};

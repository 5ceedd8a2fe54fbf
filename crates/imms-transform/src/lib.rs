#![deny(unsafe_code)]

//! Conversion from flat batch rows to FHIR Immunization resources.
//!
//! The converter is a pure function over the row: no I/O, no clock, no
//! randomness. It never rejects a value; cells that fail coercion pass
//! through as-is and are caught by validation afterwards.

pub mod build;
pub mod convert;
pub mod decorate;

pub use decorate::convert_to_immunization;

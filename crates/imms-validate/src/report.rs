//! Aggregated validation outcome.

use std::fmt;

use imms_model::ValidatedField;

/// One violated rule, located by the field's JSON path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: Option<ValidatedField>,
    pub message: String,
}

/// Every violation found in one record. The engine checks all fields before
/// reporting, so a caller sees the complete list, not just the first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: ValidatedField, message: impl Into<String>) {
        self.violations.push(Violation {
            field: Some(field),
            message: message.into(),
        });
    }

    /// A record-level violation not tied to a single field, such as a failed
    /// vaccine-type resolution.
    pub fn push_record(&mut self, message: impl Into<String>) {
        self.violations.push(Violation {
            field: None,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.violations.iter().map(|v| v.message.as_str())
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for violation in &self.violations {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}", violation.message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

//! Batch pipeline errors.
//!
//! File-level failures (`InvalidFileKey`, `InvalidHeaders`,
//! `NoOperationPermissions`) fail one file and leave its siblings alone.
//! Store-level failures are systemic and propagate out of the invocation.

use thiserror::Error;

use imms_model::VaccineType;
use imms_store::{AuditError, RepositoryError};

use crate::objects::ObjectError;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("initial file validation failed: invalid file key [{0}]")]
    InvalidFileKey(String),

    #[error("file headers do not match the expected column list")]
    InvalidHeaders,

    #[error("{supplier} does not have permissions to perform any of the requested actions for {vaccine}")]
    NoOperationPermissions {
        supplier: String,
        vaccine: VaccineType,
    },

    #[error("failed to read batch file: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error("failed to publish row message: {0}")]
    Publish(String),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl BatchError {
    /// Whether this failure is scoped to one file, as opposed to a systemic
    /// condition that must abort the invocation.
    pub fn is_file_level(&self) -> bool {
        matches!(
            self,
            BatchError::InvalidFileKey(_)
                | BatchError::InvalidHeaders
                | BatchError::NoOperationPermissions { .. }
                | BatchError::Csv(_)
        )
    }
}

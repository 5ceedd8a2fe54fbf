//! Row-level processing: one CSV row in, one outcome out.
//!
//! A row failure never aborts its siblings; the outcome carries the
//! diagnostics that end up in the ack file instead.

use std::collections::BTreeSet;

use serde_json::Value;

use imms_model::{ActionFlag, BatchRow, Operation, VaccineType};
use imms_transform::convert_to_immunization;

/// Row-level diagnostics, mirrored into the ack file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub error_type: &'static str,
    pub status_code: u16,
    pub message: String,
}

impl Diagnostics {
    pub fn invalid_action_flag() -> Self {
        Self {
            error_type: "INVALID_ACTION_FLAG",
            status_code: 400,
            message: "Invalid ACTION_FLAG - ACTION_FLAG must be 'NEW', 'UPDATE' or 'DELETE'"
                .to_string(),
        }
    }

    pub fn no_permissions() -> Self {
        Self {
            error_type: "NO_PERMISSIONS",
            status_code: 403,
            message: "No permissions for requested operation".to_string(),
        }
    }

    pub fn missing_unique_id() -> Self {
        Self {
            error_type: "MISSING_UNIQUE_ID",
            status_code: 400,
            message: "UNIQUE_ID or UNIQUE_ID_URI is missing".to_string(),
        }
    }
}

/// What became of one row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// The row converted; the resource is ready to publish.
    Converted {
        operation: Operation,
        resource: Value,
    },
    Failed(Diagnostics),
}

/// The processed row: its local identifier, the operation as requested (the
/// raw flag when it was unrecognisable) and the outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedRow {
    pub local_id: String,
    pub requested: String,
    pub outcome: RowOutcome,
}

/// Process one row against the supplier's allowed operations.
pub fn process_row(
    row: &BatchRow,
    vaccine: VaccineType,
    allowed_operations: &BTreeSet<Operation>,
) -> ProcessedRow {
    // The local id identifies the row to the supplier even when the row is
    // otherwise unusable.
    let local_id = format!("{}^{}", row.get("UNIQUE_ID"), row.get("UNIQUE_ID_URI"));

    let action_flag = row.get("ACTION_FLAG");
    let Ok(flag) = ActionFlag::parse(action_flag) else {
        tracing::info!(action_flag, "invalid ACTION_FLAG");
        return ProcessedRow {
            local_id,
            requested: action_flag.trim().to_uppercase(),
            outcome: RowOutcome::Failed(Diagnostics::invalid_action_flag()),
        };
    };
    let operation = flag.operation();

    if !allowed_operations.contains(&operation) {
        tracing::info!(%operation, "supplier lacks permission for requested operation");
        return ProcessedRow {
            local_id,
            requested: operation.to_string(),
            outcome: RowOutcome::Failed(Diagnostics::no_permissions()),
        };
    }

    if row.get("UNIQUE_ID").is_empty() || row.get("UNIQUE_ID_URI").is_empty() {
        tracing::warn!("row is missing UNIQUE_ID or UNIQUE_ID_URI");
        return ProcessedRow {
            local_id,
            requested: operation.to_string(),
            outcome: RowOutcome::Failed(Diagnostics::missing_unique_id()),
        };
    }

    ProcessedRow {
        local_id,
        requested: operation.to_string(),
        outcome: RowOutcome::Converted {
            operation,
            resource: convert_to_immunization(row, vaccine),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_operations() -> BTreeSet<Operation> {
        Operation::ALL.into()
    }

    fn base_row() -> BatchRow {
        BatchRow::from_pairs([
            ("ACTION_FLAG", "new"),
            ("UNIQUE_ID", "0001"),
            ("UNIQUE_ID_URI", "https://www.ravs.england.nhs.uk/"),
        ])
    }

    #[test]
    fn valid_row_converts() {
        let processed = process_row(&base_row(), VaccineType::Rsv, &all_operations());
        assert_eq!(processed.local_id, "0001^https://www.ravs.england.nhs.uk/");
        assert_eq!(processed.requested, "CREATE");
        assert!(matches!(
            processed.outcome,
            RowOutcome::Converted {
                operation: Operation::Create,
                ..
            }
        ));
    }

    #[test]
    fn invalid_action_flag_fails_with_the_raw_flag() {
        let mut row = base_row();
        row.set("ACTION_FLAG", "insert");
        let processed = process_row(&row, VaccineType::Rsv, &all_operations());
        assert_eq!(processed.requested, "INSERT");
        assert_eq!(
            processed.outcome,
            RowOutcome::Failed(Diagnostics::invalid_action_flag())
        );
    }

    #[test]
    fn permission_check_precedes_unique_id_check() {
        let mut row = base_row();
        row.set("ACTION_FLAG", "delete");
        row.set("UNIQUE_ID", "");
        let processed = process_row(&row, VaccineType::Rsv, &BTreeSet::from([Operation::Create]));
        assert_eq!(
            processed.outcome,
            RowOutcome::Failed(Diagnostics::no_permissions())
        );
    }

    #[test]
    fn missing_unique_id_fails_after_permissions() {
        let mut row = base_row();
        row.set("UNIQUE_ID_URI", "");
        let processed = process_row(&row, VaccineType::Rsv, &all_operations());
        assert_eq!(processed.local_id, "0001^");
        assert_eq!(
            processed.outcome,
            RowOutcome::Failed(Diagnostics::missing_unique_id())
        );
    }
}

//! Supplier permission resolution.
//!
//! Permissions are granted per vaccine type as `{VACCINE}_{OPERATION}`
//! keys, with `{VACCINE}_FULL` granting all three operations.

use std::collections::BTreeSet;

use imms_model::{ActionFlag, Operation, VaccineType};

use crate::error::BatchError;

/// The operations a supplier's permission set allows for one vaccine type.
pub fn allowed_operations<S: AsRef<str>>(
    vaccine: VaccineType,
    permissions: &[S],
) -> BTreeSet<Operation> {
    let has = |key: &str| permissions.iter().any(|p| p.as_ref() == key);

    if has(&vaccine.full_permission()) {
        return Operation::ALL.into();
    }
    Operation::ALL
        .into_iter()
        .filter(|op| has(&vaccine.operation_permission(*op)))
        .collect()
}

/// File-level permission gate: at least one of the operations requested by
/// the file's ACTION_FLAG column must be permitted. Returns the full allowed
/// set for row-level checks.
pub fn validate_action_flag_permissions<S: AsRef<str>>(
    supplier: &str,
    vaccine: VaccineType,
    permissions: &[S],
    action_flags: &BTreeSet<String>,
) -> Result<BTreeSet<Operation>, BatchError> {
    let allowed = allowed_operations(vaccine, permissions);

    // Full permission passes the gate outright, whatever the file requests.
    if permissions
        .iter()
        .any(|p| p.as_ref() == vaccine.full_permission())
    {
        return Ok(allowed);
    }

    let requested: BTreeSet<Operation> = action_flags
        .iter()
        .filter_map(|flag| ActionFlag::parse(flag).ok())
        .map(ActionFlag::operation)
        .collect();

    if requested.is_disjoint(&allowed) {
        return Err(BatchError::NoOperationPermissions {
            supplier: supplier.to_string(),
            vaccine,
        });
    }
    tracing::info!(
        supplier,
        vaccine = vaccine.as_str(),
        ?allowed,
        "supplier permitted for at least one requested operation"
    );
    Ok(allowed)
}

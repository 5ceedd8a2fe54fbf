//! Conditional writer for stored immunization records.
//!
//! Records are keyed by `Immunization#{id}` with an identifier index over
//! `{system}#{value}`. Deletion is a soft tombstone: a `DeletionStatus`
//! tri-state plus a `DeletedAt` timestamp whose presence gates the
//! conditional updates.
//!
//! The identifier-uniqueness checks read the index and then write; two
//! concurrent submissions of the same identifier can both pass the read.
//! The window is accepted: the conditional writes still keep every stored
//! item internally consistent, and batch files for one supplier are
//! serialized by the audit queue upstream.

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use thiserror::Error;

use imms_model::{Operation, VaccineType};

use crate::store::{IDENTIFIER_INDEX, Mutation, Precondition, RecordStore, StoreError};

/// Lifecycle of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionStatus {
    Active,
    Deleted,
    Reinstated,
}

impl DeletionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeletionStatus::Active => "Active",
            DeletionStatus::Deleted => "Deleted",
            DeletionStatus::Reinstated => "Reinstated",
        }
    }
}

impl fmt::Display for DeletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("the provided identifier [{0}] is duplicated")]
    IdentifierDuplication(String),
    #[error("immunization resource does not exist or has been deleted: [{0}]")]
    ResourceNotFound(String),
    #[error("unhandled record store response: {0}")]
    UnhandledResponse(#[from] StoreError),
}

/// The `{system}#{value}` identifier key of a resource's first identifier.
fn identifier_pk(resource: &Value) -> Option<String> {
    let identifier = resource.get("identifier")?.get(0)?;
    let system = identifier.get("system")?.as_str()?;
    let value = identifier.get("value")?.as_str()?;
    Some(format!("{system}#{value}"))
}

fn record_pk(id: &str) -> String {
    format!("Immunization#{id}")
}

fn is_deleted(item: &Value) -> bool {
    item.get("DeletionStatus").and_then(Value::as_str) == Some(DeletionStatus::Deleted.as_str())
}

#[derive(Debug)]
pub struct ImmunizationRepository<S> {
    store: S,
}

impl<S: RecordStore> ImmunizationRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The live (non-deleted) stored item carrying this identifier, if any.
    fn find_live(&self, identifier: &str) -> Result<Option<Value>, RepositoryError> {
        let matches = self
            .store
            .query_by_index(IDENTIFIER_INDEX, identifier, None)?;
        Ok(matches.into_iter().find(|item| !is_deleted(item)))
    }

    /// Store a new record under `id`. The identifier must not already be in
    /// use by a live record.
    pub fn create(
        &self,
        id: &str,
        resource: &Value,
        supplier_system: &str,
        vaccine: VaccineType,
    ) -> Result<(), RepositoryError> {
        let identifier = identifier_pk(resource).ok_or_else(|| {
            StoreError::Unhandled("resource has no usable identifier".to_string())
        })?;
        if self.find_live(&identifier)?.is_some() {
            return Err(RepositoryError::IdentifierDuplication(identifier));
        }

        let mut stored = resource.clone();
        if let Some(fields) = stored.as_object_mut() {
            fields.insert("id".to_string(), Value::String(id.to_string()));
        }
        let item = json!({
            "PK": record_pk(id),
            "IdentifierPK": identifier,
            "Resource": stored,
            "Operation": Operation::Create.as_str(),
            "Version": 1,
            "DeletionStatus": DeletionStatus::Active.as_str(),
            "SupplierSystem": supplier_system,
            "VaccineType": vaccine.as_str(),
        });
        match self
            .store
            .conditional_put(&record_pk(id), item, Precondition::KeyAbsent)
        {
            Ok(()) => {
                tracing::info!(id, vaccine = vaccine.as_str(), "record created");
                Ok(())
            }
            Err(StoreError::PreconditionFailed { .. }) => {
                Err(RepositoryError::IdentifierDuplication(identifier))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Replace the stored resource for the live record carrying the incoming
    /// resource's identifier.
    pub fn update(
        &self,
        resource: &Value,
        supplier_system: &str,
        vaccine: VaccineType,
    ) -> Result<(), RepositoryError> {
        let identifier = identifier_pk(resource).ok_or_else(|| {
            StoreError::Unhandled("resource has no usable identifier".to_string())
        })?;
        let Some(found) = self.find_live(&identifier)? else {
            return Err(RepositoryError::ResourceNotFound(identifier));
        };

        // A live record under the same identifier but a different resource
        // id means the identifier is claimed by someone else.
        let found_id = found
            .get("Resource")
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str);
        let incoming_id = resource.get("id").and_then(Value::as_str);
        if let (Some(found_id), Some(incoming_id)) = (found_id, incoming_id)
            && found_id != incoming_id
        {
            return Err(RepositoryError::IdentifierDuplication(identifier));
        }

        let Some(found_id) = found_id else {
            return Err(StoreError::Unhandled(format!(
                "stored record for [{identifier}] has no resource id"
            ))
            .into());
        };
        let mut stored = resource.clone();
        if let Some(fields) = stored.as_object_mut() {
            fields.insert("id".to_string(), Value::String(found_id.to_string()));
        }

        match self.store.conditional_update(
            &record_pk(found_id),
            vec![
                Mutation::Set("Resource", stored),
                Mutation::Set("Operation", Value::String(Operation::Update.as_str().to_string())),
                Mutation::Set("SupplierSystem", Value::String(supplier_system.to_string())),
                Mutation::Increment("Version"),
            ],
            Precondition::KeyExistsWithout("DeletedAt"),
        ) {
            Ok(_) => {
                tracing::info!(id = found_id, vaccine = vaccine.as_str(), "record updated");
                Ok(())
            }
            Err(StoreError::PreconditionFailed { .. }) => {
                Err(RepositoryError::ResourceNotFound(identifier))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Tombstone the live record carrying this identifier.
    pub fn delete(
        &self,
        identifier_system: &str,
        identifier_value: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let identifier = format!("{identifier_system}#{identifier_value}");
        let Some(found) = self.find_live(&identifier)? else {
            return Err(RepositoryError::ResourceNotFound(identifier));
        };
        let Some(pk) = found.get("PK").and_then(Value::as_str) else {
            return Err(StoreError::Unhandled(format!(
                "stored record for [{identifier}] has no primary key"
            ))
            .into());
        };

        match self.store.conditional_update(
            pk,
            vec![
                Mutation::Set(
                    "DeletionStatus",
                    Value::String(DeletionStatus::Deleted.as_str().to_string()),
                ),
                Mutation::Set("DeletedAt", Value::String(now.to_rfc3339())),
                Mutation::Set("Operation", Value::String(Operation::Delete.as_str().to_string())),
            ],
            Precondition::KeyExistsWithout("DeletedAt"),
        ) {
            Ok(_) => {
                tracing::info!(identifier, "record deleted");
                Ok(())
            }
            Err(StoreError::PreconditionFailed { .. }) => {
                Err(RepositoryError::ResourceNotFound(identifier))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Bring a tombstoned record back, bumping its version.
    pub fn reinstate(
        &self,
        identifier_system: &str,
        identifier_value: &str,
    ) -> Result<(), RepositoryError> {
        let identifier = format!("{identifier_system}#{identifier_value}");
        let matches = self
            .store
            .query_by_index(IDENTIFIER_INDEX, &identifier, None)?;
        let Some(found) = matches.into_iter().find(|item| is_deleted(item)) else {
            return Err(RepositoryError::ResourceNotFound(identifier));
        };
        let Some(pk) = found.get("PK").and_then(Value::as_str) else {
            return Err(StoreError::Unhandled(format!(
                "stored record for [{identifier}] has no primary key"
            ))
            .into());
        };

        match self.store.conditional_update(
            pk,
            vec![
                Mutation::Set(
                    "DeletionStatus",
                    Value::String(DeletionStatus::Reinstated.as_str().to_string()),
                ),
                Mutation::Remove("DeletedAt"),
                Mutation::Increment("Version"),
            ],
            Precondition::KeyExistsWith("DeletedAt"),
        ) {
            Ok(_) => {
                tracing::info!(identifier, "record reinstated");
                Ok(())
            }
            Err(StoreError::PreconditionFailed { .. }) => {
                Err(RepositoryError::ResourceNotFound(identifier))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// The stored items carrying this identifier, live or tombstoned.
    /// Exposed for completion checks and tests.
    pub fn find_by_identifier(
        &self,
        identifier_system: &str,
        identifier_value: &str,
    ) -> Result<Vec<Value>, RepositoryError> {
        let identifier = format!("{identifier_system}#{identifier_value}");
        Ok(self
            .store
            .query_by_index(IDENTIFIER_INDEX, &identifier, None)?)
    }
}

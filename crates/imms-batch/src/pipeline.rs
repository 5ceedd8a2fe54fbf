//! Batch orchestration.
//!
//! One `BatchProcessor` owns references to the injected collaborators: the
//! object store holding source and ack files, the audit table serializing
//! files per supplier queue, the repository applying row operations, and
//! the publisher carrying row messages downstream. File-level failures ack
//! and archive the file; systemic store failures propagate out.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use imms_model::{BatchRow, EXPECTED_HEADERS, Operation};
use imms_store::{
    AuditTable, ImmunizationRepository, RecordStore, Registration, RepositoryError,
};

use crate::ack::{AckAccumulator, create_ack_row, error_message_for_ack, make_file_level_ack};
use crate::error::BatchError;
use crate::file_key::{FileKey, validate_file_key};
use crate::objects::{ObjectStore, move_object};
use crate::permissions::validate_action_flag_permissions;
use crate::row::{Diagnostics, ProcessedRow, RowOutcome, process_row};

/// Downstream sink for per-row messages.
pub trait RowPublisher {
    fn publish(&self, supplier: &str, message: &Value) -> Result<(), String>;
}

/// Publisher that only logs; for runs where no downstream consumer exists.
#[derive(Debug, Default)]
pub struct NullPublisher;

impl RowPublisher for NullPublisher {
    fn publish(&self, supplier: &str, message: &Value) -> Result<(), String> {
        tracing::debug!(supplier, row_id = message["row_id"].as_str(), "row message published");
        Ok(())
    }
}

/// How a submitted file ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDisposition {
    Processed,
    Queued,
    Duplicate,
    Rejected,
}

impl FileDisposition {
    pub fn as_str(self) -> &'static str {
        match self {
            FileDisposition::Processed => "Processed",
            FileDisposition::Queued => "Queued",
            FileDisposition::Duplicate => "Duplicate",
            FileDisposition::Rejected => "Rejected",
        }
    }
}

/// Per-file summary returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub file_key: String,
    pub message_id: String,
    pub disposition: FileDisposition,
    pub total_rows: usize,
    pub successful_rows: usize,
    pub failed_rows: usize,
}

impl FileReport {
    fn without_rows(file_key: &str, message_id: &str, disposition: FileDisposition) -> Self {
        Self {
            file_key: file_key.to_string(),
            message_id: message_id.to_string(),
            disposition,
            total_rows: 0,
            successful_rows: 0,
            failed_rows: 0,
        }
    }
}

pub struct BatchProcessor<'a, A: RecordStore, R: RecordStore> {
    objects: &'a dyn ObjectStore,
    audit: &'a AuditTable<A>,
    repository: &'a ImmunizationRepository<R>,
    publisher: &'a dyn RowPublisher,
    /// Supplier name to granted permission keys.
    permissions: BTreeMap<String, Vec<String>>,
}

impl<'a, A: RecordStore, R: RecordStore> BatchProcessor<'a, A, R> {
    pub fn new(
        objects: &'a dyn ObjectStore,
        audit: &'a AuditTable<A>,
        repository: &'a ImmunizationRepository<R>,
        publisher: &'a dyn RowPublisher,
        permissions: BTreeMap<String, Vec<String>>,
    ) -> Self {
        Self {
            objects,
            audit,
            repository,
            publisher,
            permissions,
        }
    }

    /// Register a newly arrived file and run it (and any files it unblocks)
    /// to completion. Returns one report per file handled.
    pub fn submit_file(
        &self,
        key: &str,
        message_id: &str,
        arrived_at: DateTime<Utc>,
    ) -> Result<Vec<FileReport>, BatchError> {
        let created_at = created_at_string(arrived_at);

        let file_key = match validate_file_key(key) {
            Ok(file_key) => file_key,
            Err(err) => {
                // No queue can be derived from an invalid key, so the file
                // is rejected outright without an audit entry.
                tracing::warn!(key, %err, "file key rejected");
                make_file_level_ack(self.objects, message_id, key, false, &created_at)?;
                if self.objects.exists(key)? {
                    move_object(self.objects, key, &format!("archive/{key}"))?;
                }
                return Ok(vec![FileReport::without_rows(
                    key,
                    message_id,
                    FileDisposition::Rejected,
                )]);
            }
        };

        let registration = self.audit.register_file(
            message_id,
            &file_key.key,
            &file_key.queue_name(),
            arrived_at,
        )?;
        match registration {
            Registration::Duplicate => {
                tracing::warn!(key, "duplicate filename, not processed");
                make_file_level_ack(self.objects, message_id, key, false, &created_at)?;
                Ok(vec![FileReport::without_rows(
                    key,
                    message_id,
                    FileDisposition::Duplicate,
                )])
            }
            Registration::Queued => Ok(vec![FileReport::without_rows(
                key,
                message_id,
                FileDisposition::Queued,
            )]),
            Registration::Process => self.run_until_queue_empty(file_key, message_id, created_at),
        }
    }

    /// Resume a queue that has waiting entries but no active file: hand off
    /// to the earliest queued entry and drain from there. Returns an empty
    /// list when nothing is waiting.
    pub fn drain_queue(&self, queue_name: &str) -> Result<Vec<FileReport>, BatchError> {
        match self.audit.next_queued(queue_name)? {
            Some(next) => {
                self.audit.mark_processing(&next.message_id)?;
                let file_key = validate_file_key(&next.filename)?;
                let created_at = created_at_from_rfc3339(&next.timestamp)?;
                self.run_until_queue_empty(file_key, &next.message_id, created_at)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Process the given file, then keep draining the queue it belongs to:
    /// each completion hands off to the earliest queued file.
    fn run_until_queue_empty(
        &self,
        file_key: FileKey,
        message_id: &str,
        created_at: String,
    ) -> Result<Vec<FileReport>, BatchError> {
        let mut reports = Vec::new();
        let mut current = Some((file_key, message_id.to_string(), created_at));

        while let Some((file_key, message_id, created_at)) = current.take() {
            let queue_name = file_key.queue_name();
            reports.push(self.process_file(&file_key, &message_id, &created_at)?);

            if let Some(next) = self.audit.next_queued(&queue_name)? {
                self.audit.mark_processing(&next.message_id)?;
                let next_key = validate_file_key(&next.filename)?;
                let next_created_at = created_at_from_rfc3339(&next.timestamp)?;
                current = Some((next_key, next.message_id, next_created_at));
            }
        }
        Ok(reports)
    }

    /// Run one file end to end: file-level validation, row processing, ack
    /// accumulation and completion.
    fn process_file(
        &self,
        file_key: &FileKey,
        message_id: &str,
        created_at: &str,
    ) -> Result<FileReport, BatchError> {
        match self.process_rows(file_key, message_id, created_at) {
            Ok(report) => Ok(report),
            Err(err) if err.is_file_level() => {
                tracing::error!(key = file_key.key, %err, "file-level validation failed");
                make_file_level_ack(self.objects, message_id, &file_key.key, false, created_at)?;
                if self.objects.exists(&file_key.key)? {
                    move_object(
                        self.objects,
                        &file_key.key,
                        &format!("archive/{}", file_key.key),
                    )?;
                }
                self.audit.mark_processed(message_id)?;
                Ok(FileReport::without_rows(
                    &file_key.key,
                    message_id,
                    FileDisposition::Rejected,
                ))
            }
            Err(err) => Err(err),
        }
    }

    fn process_rows(
        &self,
        file_key: &FileKey,
        message_id: &str,
        created_at: &str,
    ) -> Result<FileReport, BatchError> {
        let source = self.objects.get(&file_key.key)?;
        let rows = read_batch_rows(&source)?;

        let action_flags: BTreeSet<String> = rows
            .iter()
            .map(|row| row.get("ACTION_FLAG").trim().to_uppercase())
            .collect();
        let supplier_permissions = self
            .permissions
            .get(file_key.supplier)
            .cloned()
            .unwrap_or_default();
        let allowed = validate_action_flag_permissions(
            file_key.supplier,
            file_key.vaccine,
            &supplier_permissions,
            &action_flags,
        )?;

        make_file_level_ack(self.objects, message_id, &file_key.key, true, created_at)?;

        let accumulator = AckAccumulator::new(self.objects, &file_key.key, created_at);
        let source_rows = rows.len();
        let mut successful = 0usize;
        let mut failed = 0usize;

        for (index, row) in rows.iter().enumerate() {
            let row_id = format!("{message_id}#{}", index + 1);
            let processed = process_row(row, file_key.vaccine, &allowed);

            let message = row_message(file_key, created_at, &row_id, &processed);
            self.publisher
                .publish(file_key.supplier, &message)
                .map_err(BatchError::Publish)?;

            let (imms_id, diagnostics) = match &processed.outcome {
                RowOutcome::Converted {
                    operation,
                    resource,
                } => match imms_validate::validate(resource) {
                    Ok(_) => match self.apply_operation(*operation, resource, row, file_key)? {
                        Ok(imms_id) => (imms_id, None),
                        Err(diagnostics) => (None, Some(diagnostics)),
                    },
                    Err(report) => (
                        None,
                        Some(Diagnostics {
                            error_type: "VALIDATION_ERROR",
                            status_code: 400,
                            message: report.to_string(),
                        }),
                    ),
                },
                RowOutcome::Failed(diagnostics) => (None, Some(diagnostics.clone())),
            };

            if diagnostics.is_some() {
                failed += 1;
            } else {
                successful += 1;
            }
            let ack_row = create_ack_row(
                created_at,
                &processed.local_id,
                &row_id,
                diagnostics.as_ref().map(error_message_for_ack),
                imms_id.as_deref(),
            );
            let destination_rows = accumulator.append(&[ack_row])?;

            // Row-count parity marks completion; the finalize CAS keeps a
            // replayed ack from archiving twice.
            if destination_rows == source_rows && self.audit.try_finalize(message_id)? {
                move_object(
                    self.objects,
                    &file_key.key,
                    &format!("archive/{}", file_key.key),
                )?;
                self.audit.mark_processed(message_id)?;
            }
        }

        // An empty file reaches parity trivially: nothing to ack, archive now.
        if source_rows == 0 && self.audit.try_finalize(message_id)? {
            move_object(
                self.objects,
                &file_key.key,
                &format!("archive/{}", file_key.key),
            )?;
            self.audit.mark_processed(message_id)?;
        }

        tracing::info!(
            key = file_key.key,
            total = source_rows,
            successful,
            failed,
            "file processed"
        );
        Ok(FileReport {
            file_key: file_key.key.clone(),
            message_id: message_id.to_string(),
            disposition: FileDisposition::Processed,
            total_rows: source_rows,
            successful_rows: successful,
            failed_rows: failed,
        })
    }

    /// Apply a converted row to the record store. Row-scoped store refusals
    /// come back as diagnostics; anything systemic propagates.
    fn apply_operation(
        &self,
        operation: Operation,
        resource: &Value,
        row: &BatchRow,
        file_key: &FileKey,
    ) -> Result<Result<Option<String>, Diagnostics>, BatchError> {
        let system = row.get("UNIQUE_ID_URI");
        let value = row.get("UNIQUE_ID");
        let id = resource_id(system, value);

        let result = match operation {
            Operation::Create => self
                .repository
                .create(&id, resource, file_key.supplier, file_key.vaccine)
                .map(|()| Some(id.clone())),
            Operation::Update => self
                .update_or_reinstate(resource, system, value, file_key)
                .map(Some),
            Operation::Delete => self
                .repository
                .delete(system, value, Utc::now())
                .map(|()| None),
        };

        match result {
            Ok(imms_id) => Ok(Ok(imms_id)),
            Err(RepositoryError::IdentifierDuplication(identifier)) => Ok(Err(Diagnostics {
                error_type: "IDENTIFIER_DUPLICATION",
                status_code: 422,
                message: format!("The provided identifier [{identifier}] is duplicated"),
            })),
            Err(RepositoryError::ResourceNotFound(identifier)) => Ok(Err(Diagnostics {
                error_type: "RESOURCE_NOT_FOUND",
                status_code: 404,
                message: format!(
                    "Immunization resource does not exist or has been deleted: [{identifier}]"
                ),
            })),
            Err(err @ RepositoryError::UnhandledResponse(_)) => Err(err.into()),
        }
    }

    /// An update against a tombstoned record reinstates it first.
    fn update_or_reinstate(
        &self,
        resource: &Value,
        system: &str,
        value: &str,
        file_key: &FileKey,
    ) -> Result<String, RepositoryError> {
        let attempt = self
            .repository
            .update(resource, file_key.supplier, file_key.vaccine);
        if let Err(RepositoryError::ResourceNotFound(_)) = &attempt {
            let any_deleted = self
                .repository
                .find_by_identifier(system, value)?
                .iter()
                .any(|item| {
                    item.get("DeletionStatus").and_then(Value::as_str) == Some("Deleted")
                });
            if any_deleted {
                self.repository.reinstate(system, value)?;
                self.repository
                    .update(resource, file_key.supplier, file_key.vaccine)?;
                return Ok(resource_id(system, value));
            }
        }
        attempt.map(|()| resource_id(system, value))
    }
}

/// Deterministic store id for a row's business identifier.
fn resource_id(system: &str, value: &str) -> String {
    format!("{system}#{value}")
}

fn created_at_string(arrived_at: DateTime<Utc>) -> String {
    arrived_at.format("%Y%m%dT%H%M%S00").to_string()
}

fn created_at_from_rfc3339(timestamp: &str) -> Result<String, BatchError> {
    let parsed = DateTime::parse_from_rfc3339(timestamp).map_err(|err| {
        BatchError::Audit(imms_store::AuditError::Unhandled(
            imms_store::StoreError::Unhandled(format!(
                "audit timestamp [{timestamp}] is not RFC 3339: {err}"
            )),
        ))
    })?;
    Ok(created_at_string(parsed.with_timezone(&Utc)))
}

/// The outgoing per-row message.
fn row_message(
    file_key: &FileKey,
    created_at: &str,
    row_id: &str,
    processed: &ProcessedRow,
) -> Value {
    let mut message = json!({
        "row_id": row_id,
        "file_key": file_key.key,
        "supplier": file_key.supplier,
        "vaccine_type": file_key.vaccine.as_str(),
        "created_at_formatted_string": created_at,
        "local_id": processed.local_id,
        "operation_requested": processed.requested,
    });
    match &processed.outcome {
        RowOutcome::Converted { resource, .. } => {
            message["fhir_json"] = resource.clone();
        }
        RowOutcome::Failed(diagnostics) => {
            message["diagnostics"] = json!({
                "error_type": diagnostics.error_type,
                "statusCode": diagnostics.status_code,
                "error_message": diagnostics.message,
            });
        }
    }
    message
}

/// Parse a pipe-delimited batch file, requiring the exact expected header
/// row.
fn read_batch_rows(source: &[u8]) -> Result<Vec<BatchRow>, BatchError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .from_reader(source);

    let headers = reader.headers()?.clone();
    if headers.iter().ne(EXPECTED_HEADERS) {
        return Err(BatchError::InvalidHeaders);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(BatchRow::from_pairs(
            headers.iter().zip(record.iter()).map(|(h, v)| (h, v)),
        ));
    }
    Ok(rows)
}

//! The audit/queue state machine.
//!
//! One entry per submitted file, keyed by `message_id`. Files in the same
//! queue (supplier + vaccine type) run strictly in timestamp order; queues
//! are independent of each other. Duplicate filenames are rejected before
//! processing, regardless of message_id.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use thiserror::Error;

use crate::store::{
    FILENAME_INDEX, Mutation, Precondition, QUEUE_NAME_INDEX, RecordStore, StoreError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Processing,
    Queued,
    Processed,
    NotProcessedDuplicate,
}

impl AuditStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditStatus::Processing => "Processing",
            AuditStatus::Queued => "Queued",
            AuditStatus::Processed => "Processed",
            AuditStatus::NotProcessedDuplicate => "Not processed - duplicate",
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Processing" => Ok(AuditStatus::Processing),
            "Queued" => Ok(AuditStatus::Queued),
            "Processed" => Ok(AuditStatus::Processed),
            "Not processed - duplicate" => Ok(AuditStatus::NotProcessedDuplicate),
            other => Err(StoreError::Unhandled(format!(
                "unrecognized audit status [{other}]"
            ))),
        }
    }
}

/// Outcome of registering a newly arrived file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Nothing ahead of it: process immediately.
    Process,
    /// An earlier file in the same queue is still processing or itself
    /// queued: wait.
    Queued,
    /// The filename has been seen before: terminal, never processed.
    Duplicate,
}

/// A file waiting its turn in a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedFile {
    pub message_id: String,
    pub filename: String,
    pub queue_name: String,
    pub timestamp: String,
}

/// The audit table must only ever be appended to under a fresh message_id;
/// any other store failure here is unrecoverable by design.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit entry for message_id [{0}] already exists")]
    MessageIdReuse(String),
    #[error("unhandled audit table error: {0}")]
    Unhandled(#[from] StoreError),
}

#[derive(Debug)]
pub struct AuditTable<S> {
    store: S,
}

impl<S: RecordStore> AuditTable<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Record a file's arrival and decide whether it may be processed now.
    pub fn register_file(
        &self,
        message_id: &str,
        filename: &str,
        queue_name: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Registration, AuditError> {
        let duplicate = !self
            .store
            .query_by_index(FILENAME_INDEX, filename, Some(1))?
            .is_empty();

        let (status, registration) = if duplicate {
            (AuditStatus::NotProcessedDuplicate, Registration::Duplicate)
        } else if self.queue_busy(queue_name)? {
            (AuditStatus::Queued, Registration::Queued)
        } else {
            (AuditStatus::Processing, Registration::Process)
        };

        let entry = json!({
            "message_id": message_id,
            "filename": filename,
            "queue_name": queue_name,
            "timestamp": timestamp.to_rfc3339(),
            "status": status.as_str(),
        });
        match self
            .store
            .conditional_put(message_id, entry, Precondition::KeyAbsent)
        {
            Ok(()) => {
                tracing::info!(message_id, filename, %status, "audit entry created");
                Ok(registration)
            }
            Err(StoreError::PreconditionFailed { .. }) => {
                Err(AuditError::MessageIdReuse(message_id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// A queue is busy while any entry is `Processing` or still `Queued`
    /// waiting its turn; a new arrival must queue behind both.
    fn queue_busy(&self, queue_name: &str) -> Result<bool, StoreError> {
        for status in [AuditStatus::Processing, AuditStatus::Queued] {
            let key = format!("{queue_name}#{}", status.as_str());
            if !self
                .store
                .query_by_index(QUEUE_NAME_INDEX, &key, Some(1))?
                .is_empty()
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Take a queued entry into processing when its turn comes.
    pub fn mark_processing(&self, message_id: &str) -> Result<(), AuditError> {
        self.store.conditional_update(
            message_id,
            vec![Mutation::Set(
                "status",
                Value::String(AuditStatus::Processing.as_str().to_string()),
            )],
            Precondition::KeyExists,
        )?;
        tracing::info!(message_id, "audit entry marked processing");
        Ok(())
    }

    /// Transition an entry to `Processed`.
    pub fn mark_processed(&self, message_id: &str) -> Result<(), AuditError> {
        self.store.conditional_update(
            message_id,
            vec![Mutation::Set(
                "status",
                Value::String(AuditStatus::Processed.as_str().to_string()),
            )],
            Precondition::KeyExists,
        )?;
        tracing::info!(message_id, "audit entry marked processed");
        Ok(())
    }

    /// Claim the right to run completion for this entry. Exactly one caller
    /// wins; the rest observe `false` and must do nothing further.
    pub fn try_finalize(&self, message_id: &str) -> Result<bool, AuditError> {
        match self.store.conditional_update(
            message_id,
            vec![Mutation::Set("finalized", Value::Bool(true))],
            Precondition::KeyExistsWithout("finalized"),
        ) {
            Ok(_) => Ok(true),
            Err(StoreError::PreconditionFailed { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// The earliest-arrived file still waiting in the queue, if any.
    pub fn next_queued(&self, queue_name: &str) -> Result<Option<QueuedFile>, AuditError> {
        let key = format!("{queue_name}#{}", AuditStatus::Queued.as_str());
        let entries = self.store.query_by_index(QUEUE_NAME_INDEX, &key, None)?;
        // RFC 3339 UTC timestamps order lexicographically.
        let earliest = entries.into_iter().min_by(|a, b| {
            let ts = |e: &Value| e["timestamp"].as_str().unwrap_or("").to_string();
            ts(a).cmp(&ts(b))
        });
        earliest.map(|entry| queued_file(&entry)).transpose()
    }
}

fn queued_file(entry: &Value) -> Result<QueuedFile, AuditError> {
    let field = |name: &str| -> Result<String, AuditError> {
        entry[name]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                StoreError::Unhandled(format!("audit entry missing attribute [{name}]")).into()
            })
    };
    Ok(QueuedFile {
        message_id: field("message_id")?,
        filename: field("filename")?,
        queue_name: field("queue_name")?,
        timestamp: field("timestamp")?,
    })
}

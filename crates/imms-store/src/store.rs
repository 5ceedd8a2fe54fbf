//! The conditional key-value store contract.
//!
//! Every write takes a [`Precondition`] evaluated atomically with the write
//! itself. A failed precondition is a distinct, matchable error: callers
//! branch on it (duplicate detection, lost finalize races) and must never
//! have to parse a message to find out what happened.

use serde_json::Value;
use thiserror::Error;

/// Condition a write is guarded by, evaluated atomically with the write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// The key must not exist.
    KeyAbsent,
    /// The key must exist.
    KeyExists,
    /// The key must exist and the item must not carry the named attribute.
    KeyExistsWithout(&'static str),
    /// The key must exist and the item must carry the named attribute.
    KeyExistsWith(&'static str),
}

/// One attribute change within a conditional update.
#[derive(Debug, Clone)]
pub enum Mutation {
    Set(&'static str, Value),
    Remove(&'static str),
    /// Add 1 to a numeric attribute, treating an absent attribute as 0.
    Increment(&'static str),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conditional check failed for key [{key}]")]
    PreconditionFailed { key: String },
    #[error("record store failure: {0}")]
    Unhandled(String),
}

/// Secondary indexes a store must answer [`RecordStore::query_by_index`]
/// against.
pub const FILENAME_INDEX: &str = "filename_index";
pub const QUEUE_NAME_INDEX: &str = "queue_name_index";
pub const IDENTIFIER_INDEX: &str = "identifier_index";

/// A key-value store with conditional writes and named secondary indexes.
pub trait RecordStore {
    /// Write a full item under `key`, subject to the precondition.
    fn conditional_put(
        &self,
        key: &str,
        item: Value,
        precondition: Precondition,
    ) -> Result<(), StoreError>;

    /// Apply mutations to the item under `key`, subject to the precondition.
    /// Returns the item as it stands after the update.
    fn conditional_update(
        &self,
        key: &str,
        mutations: Vec<Mutation>,
        precondition: Precondition,
    ) -> Result<Value, StoreError>;

    /// All items whose computed index key equals `key_value`, in primary-key
    /// order, truncated to `limit` when given.
    fn query_by_index(
        &self,
        index: &str,
        key_value: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, StoreError>;
}

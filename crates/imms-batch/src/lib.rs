#![deny(unsafe_code)]

//! Batch ingestion of immunization CSV files.
//!
//! A file travels: key validation → audit registration (queue per supplier
//! and vaccine type) → header and permission checks → per-row convert,
//! validate, publish and store → per-row ack accumulation → archive on
//! row-count parity → hand-off to the next queued file.

pub mod ack;
pub mod error;
pub mod file_key;
pub mod objects;
pub mod permissions;
pub mod pipeline;
pub mod row;

pub use ack::{ACK_HEADERS, AckAccumulator, ack_file_key, create_ack_row};
pub use error::BatchError;
pub use file_key::{FileKey, identify_supplier, validate_file_key};
pub use objects::{MemoryObjectStore, ObjectError, ObjectStore, move_object};
pub use permissions::{allowed_operations, validate_action_flag_permissions};
pub use pipeline::{
    BatchProcessor, FileDisposition, FileReport, NullPublisher, RowPublisher,
};
pub use row::{Diagnostics, ProcessedRow, RowOutcome, process_row};

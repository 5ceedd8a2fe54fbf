#![deny(unsafe_code)]

//! Storage layer: the conditional record store contract, an in-memory
//! implementation, the audit/queue state machine and the immunization
//! repository built on top of it.

pub mod audit;
pub mod memory;
pub mod repository;
pub mod store;

pub use audit::{AuditError, AuditStatus, AuditTable, QueuedFile, Registration};
pub use memory::MemoryStore;
pub use repository::{DeletionStatus, ImmunizationRepository, RepositoryError};
pub use store::{Mutation, Precondition, RecordStore, StoreError};

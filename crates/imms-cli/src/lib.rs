#![deny(unsafe_code)]

//! Library surface of the batch CLI.
//!
//! Exposes the logging setup so integration tests and embedding tools can
//! reuse the same subscriber configuration as the binary.

pub mod logging;

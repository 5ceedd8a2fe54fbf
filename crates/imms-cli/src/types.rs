use std::path::PathBuf;

use imms_batch::{FileDisposition, FileReport};

/// Outcome of a `process` run over one input folder.
pub struct ProcessResult {
    pub store_dir: PathBuf,
    pub reports: Vec<FileReport>,
    pub errors: Vec<String>,
}

impl ProcessResult {
    /// Whether anything in the run should fail the exit code.
    pub fn has_failures(&self) -> bool {
        !self.errors.is_empty()
            || self.reports.iter().any(|report| {
                report.failed_rows > 0 || report.disposition == FileDisposition::Rejected
            })
    }
}

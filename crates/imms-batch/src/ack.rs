//! Ack file accumulation.
//!
//! Two ack shapes exist: the file-level (infrastructure) ack written once
//! per file after file-level validation, and the business ack accumulated
//! row by row under `forwardedFile/`. Both are pipe-delimited.

use crate::error::BatchError;
use crate::objects::ObjectStore;
use crate::row::Diagnostics;

/// Business ack columns, order-sensitive.
pub const ACK_HEADERS: [&str; 14] = [
    "MESSAGE_HEADER_ID",
    "HEADER_RESPONSE_CODE",
    "ISSUE_SEVERITY",
    "ISSUE_CODE",
    "ISSUE_DETAILS_CODE",
    "RESPONSE_TYPE",
    "RESPONSE_CODE",
    "RESPONSE_DISPLAY",
    "RECEIVED_TIME",
    "MAILBOX_FROM",
    "LOCAL_ID",
    "IMMS_ID",
    "OPERATION_OUTCOME",
    "MESSAGE_DELIVERY",
];

/// File-level (infrastructure) ack columns.
pub const FILE_ACK_HEADERS: [&str; 12] = [
    "MESSAGE_HEADER_ID",
    "HEADER_RESPONSE_CODE",
    "ISSUE_SEVERITY",
    "ISSUE_CODE",
    "ISSUE_DETAILS_CODE",
    "RESPONSE_TYPE",
    "RESPONSE_CODE",
    "RESPONSE_DISPLAY",
    "RECEIVED_TIME",
    "MAILBOX_FROM",
    "LOCAL_ID",
    "MESSAGE_DELIVERY",
];

/// Collapse multi-line diagnostics to a single line: CR, LF, tab and NBSP
/// become spaces, then whitespace runs collapse to one space.
fn collapse_diagnostics(diagnostics: &str) -> String {
    diagnostics
        .replace(['\r', '\n', '\t', '\u{a0}'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// The error message shown in the ack file for a failed row. Diagnostics
/// whose status code marks a systemic failure get the generic message.
pub fn error_message_for_ack(diagnostics: &Diagnostics) -> &str {
    if diagnostics.status_code == 500 {
        "An unhandled error occurred during batch processing"
    } else {
        &diagnostics.message
    }
}

/// One business ack row, in header order.
pub fn create_ack_row(
    created_at: &str,
    local_id: &str,
    row_id: &str,
    diagnostics: Option<&str>,
    imms_id: Option<&str>,
) -> [String; 14] {
    let success = diagnostics.is_none();
    let collapsed = diagnostics.map(collapse_diagnostics);
    [
        row_id.to_string(),
        if success { "OK" } else { "Fatal Error" }.to_string(),
        if success { "Information" } else { "Fatal" }.to_string(),
        if success { "OK" } else { "Fatal Error" }.to_string(),
        if success { "30001" } else { "30002" }.to_string(),
        "Business".to_string(),
        if success { "30001" } else { "30002" }.to_string(),
        if success {
            "Success"
        } else {
            "Business Level Response Value - Processing Error"
        }
        .to_string(),
        created_at.to_string(),
        String::new(),
        local_id.to_string(),
        imms_id.unwrap_or_default().to_string(),
        collapsed.unwrap_or_default(),
        if success { "True" } else { "False" }.to_string(),
    ]
}

/// Join values with `|` and strip cosmetic whitespace adjacent to the
/// delimiters.
pub fn format_ack_line(values: &[String]) -> String {
    values
        .join("|")
        .replace(" |", "|")
        .replace("| ", "|")
        .trim()
        .to_string()
}

/// The business ack key for a source file key.
pub fn ack_file_key(file_key: &str, created_at: &str) -> String {
    format!(
        "forwardedFile/{}",
        file_key.replace(".csv", &format!("_BusAck_{created_at}.csv"))
    )
}

/// Write the one-row file-level ack recording whether file-level validation
/// passed.
pub fn make_file_level_ack(
    store: &dyn ObjectStore,
    message_id: &str,
    file_key: &str,
    validation_passed: bool,
    created_at: &str,
) -> Result<(), BatchError> {
    let row = [
        message_id.to_string(),
        if validation_passed { "Success" } else { "Failure" }.to_string(),
        if validation_passed { "Information" } else { "Fatal" }.to_string(),
        if validation_passed { "OK" } else { "Fatal Error" }.to_string(),
        if validation_passed { "20013" } else { "10001" }.to_string(),
        "Technical".to_string(),
        if validation_passed { "20013" } else { "10002" }.to_string(),
        if validation_passed {
            "Success"
        } else {
            "Infrastructure Level Response Value - Processing Error"
        }
        .to_string(),
        created_at.to_string(),
        String::new(),
        String::new(),
        if validation_passed { "True" } else { "False" }.to_string(),
    ];
    let content = format!(
        "{}\n{}\n",
        FILE_ACK_HEADERS.join("|"),
        format_ack_line(&row)
    );
    let ack_key = format!("ack/{}", file_key.replace(".csv", "_InfAck.csv"));
    store.put(&ack_key, content.as_bytes())?;
    tracing::info!(ack_key, validation_passed, "file-level ack written");
    Ok(())
}

/// Accumulates business ack rows for one source file.
///
/// The blob is loaded (or initialised with the header) on every append and
/// re-uploaded, so the accumulator itself holds no row state and a fresh
/// instance can continue a partially acked file.
pub struct AckAccumulator<'a> {
    store: &'a dyn ObjectStore,
    ack_key: String,
}

impl<'a> AckAccumulator<'a> {
    pub fn new(store: &'a dyn ObjectStore, file_key: &str, created_at: &str) -> Self {
        Self {
            store,
            ack_key: ack_file_key(file_key, created_at),
        }
    }

    pub fn ack_key(&self) -> &str {
        &self.ack_key
    }

    /// Append formatted rows and return the resulting data-row count.
    pub fn append(&self, rows: &[[String; 14]]) -> Result<usize, BatchError> {
        let mut content = match self.store.get(&self.ack_key) {
            Ok(existing) => String::from_utf8_lossy(&existing).into_owned(),
            Err(crate::objects::ObjectError::NotFound(_)) => {
                format!("{}\n", ACK_HEADERS.join("|"))
            }
            Err(err) => return Err(err.into()),
        };
        for row in rows {
            content.push_str(&format_ack_line(row));
            content.push('\n');
        }
        self.store.put(&self.ack_key, content.as_bytes())?;
        Ok(data_row_count(&content))
    }
}

/// Newline-delimited line count excluding the header row.
pub fn data_row_count(content: &str) -> usize {
    content.lines().count().saturating_sub(1)
}

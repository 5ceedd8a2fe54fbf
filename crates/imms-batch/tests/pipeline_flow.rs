//! End-to-end pipeline runs against the in-memory collaborators.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};

use imms_batch::{
    BatchProcessor, FileDisposition, MemoryObjectStore, ObjectStore, RowPublisher, ack_file_key,
};
use imms_model::EXPECTED_HEADERS;
use imms_store::{
    AuditTable, ImmunizationRepository, MemoryStore, Precondition, RecordStore,
};

const FILE_A: &str = "RSV_Vaccinations_v5_X26_20240904T18332500.csv";
const FILE_B: &str = "RSV_Vaccinations_v5_X26_20240904T19000000.csv";
const IDENTIFIER_SYSTEM: &str = "https://www.ravs.england.nhs.uk/";

#[derive(Default)]
struct RecordingPublisher {
    messages: Mutex<Vec<Value>>,
}

impl RecordingPublisher {
    fn published(&self) -> Vec<Value> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl RowPublisher for RecordingPublisher {
    fn publish(&self, _supplier: &str, message: &Value) -> Result<(), String> {
        self.messages
            .lock()
            .map_err(|_| "publisher mutex poisoned".to_string())?
            .push(message.clone());
        Ok(())
    }
}

/// A pipe-delimited batch file with the full expected header row; each row
/// map fills its named columns and leaves the rest blank.
fn batch_csv(rows: &[BTreeMap<&'static str, String>]) -> Vec<u8> {
    let mut content = EXPECTED_HEADERS.join("|");
    content.push('\n');
    for row in rows {
        let line: Vec<&str> = EXPECTED_HEADERS
            .iter()
            .map(|header| row.get(header).map(String::as_str).unwrap_or(""))
            .collect();
        content.push_str(&line.join("|"));
        content.push('\n');
    }
    content.into_bytes()
}

fn valid_row(unique_id: &str, action_flag: &str) -> BTreeMap<&'static str, String> {
    [
        ("NHS_NUMBER", "9990548609"),
        ("PERSON_FORENAME", "Mary"),
        ("PERSON_SURNAME", "Taylor"),
        ("PERSON_DOB", "19840101"),
        ("PERSON_GENDER_CODE", "2"),
        ("PERSON_POSTCODE", "EC1A 1BB"),
        ("DATE_AND_TIME", "20240904T183325"),
        ("SITE_CODE", "RVVKC"),
        ("SITE_CODE_TYPE_URI", "https://fhir.nhs.uk/Id/ods-organization-code"),
        ("UNIQUE_ID", unique_id),
        ("UNIQUE_ID_URI", IDENTIFIER_SYSTEM),
        ("ACTION_FLAG", action_flag),
        ("RECORDED_DATE", "20240904"),
        ("PRIMARY_SOURCE", "TRUE"),
        ("VACCINATION_PROCEDURE_CODE", "1303503001"),
        ("DOSE_SEQUENCE", "1"),
        ("DOSE_AMOUNT", "0.5"),
        ("DOSE_UNIT_CODE", "258773002"),
        ("DOSE_UNIT_TERM", "Milliliter"),
        ("LOCATION_CODE", "RJC02"),
        ("LOCATION_CODE_TYPE_URI", "https://fhir.nhs.uk/Id/ods-organization-code"),
    ]
    .into_iter()
    .map(|(k, v)| (k, v.to_string()))
    .collect()
}

fn permissions() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        ("RAVS".to_string(), vec!["RSV_FULL".to_string()]),
        ("EMIS".to_string(), vec!["FLU_CREATE".to_string()]),
    ])
}

fn arrival(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 4, 18, 33 + minute, 25).unwrap()
}

struct Harness {
    objects: MemoryObjectStore,
    audit: AuditTable<MemoryStore>,
    repository: ImmunizationRepository<MemoryStore>,
    publisher: RecordingPublisher,
}

impl Harness {
    fn new() -> Self {
        Self::with_audit_store(MemoryStore::new())
    }

    fn with_audit_store(audit_store: MemoryStore) -> Self {
        Self {
            objects: MemoryObjectStore::new(),
            audit: AuditTable::new(audit_store),
            repository: ImmunizationRepository::new(MemoryStore::new()),
            publisher: RecordingPublisher::default(),
        }
    }

    fn processor(&self) -> BatchProcessor<'_, MemoryStore, MemoryStore> {
        BatchProcessor::new(
            &self.objects,
            &self.audit,
            &self.repository,
            &self.publisher,
            permissions(),
        )
    }
}

fn ack_content(objects: &MemoryObjectStore, file_key: &str, created_at: &str) -> String {
    let key = ack_file_key(file_key, created_at);
    String::from_utf8(objects.get(&key).unwrap()).unwrap()
}

fn inf_ack_content(objects: &MemoryObjectStore, file_key: &str) -> String {
    let key = format!("ack/{}", file_key.replace(".csv", "_InfAck.csv"));
    String::from_utf8(objects.get(&key).unwrap()).unwrap()
}

#[test]
fn valid_file_processes_publishes_and_archives() {
    let harness = Harness::new();
    let rows = vec![valid_row("0001", "new"), valid_row("0002", "new")];
    harness.objects.put(FILE_A, &batch_csv(&rows)).unwrap();

    let reports = harness
        .processor()
        .submit_file(FILE_A, "m-a", arrival(0))
        .unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].disposition, FileDisposition::Processed);
    assert_eq!(reports[0].total_rows, 2);
    assert_eq!(reports[0].successful_rows, 2);
    assert_eq!(reports[0].failed_rows, 0);

    // Source archived; business ack accumulated with header + 2 rows.
    assert!(!harness.objects.exists(FILE_A).unwrap());
    assert!(harness.objects.exists(&format!("archive/{FILE_A}")).unwrap());
    let ack = ack_content(&harness.objects, FILE_A, "20240904T18332500");
    let lines: Vec<&str> = ack.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains("|OK|Information|OK|30001|Business|30001|Success|"));
    assert!(lines[1].ends_with("|True"));

    // File-level validation passed, recorded in the infrastructure ack.
    assert!(inf_ack_content(&harness.objects, FILE_A).contains("|Success|"));

    // One message per row went downstream, carrying the converted resource.
    let published = harness.publisher.published();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0]["row_id"], "m-a#1");
    assert_eq!(published[0]["supplier"], "RAVS");
    assert_eq!(published[0]["fhir_json"]["resourceType"], "Immunization");

    // Both records landed in the store.
    let items = harness
        .repository
        .find_by_identifier(IDENTIFIER_SYSTEM, "0001")
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["Version"], 1);
    assert_eq!(items[0]["SupplierSystem"], "RAVS");
}

#[test]
fn duplicate_filename_is_not_reprocessed() {
    let harness = Harness::new();
    let rows = vec![valid_row("0001", "new")];
    harness.objects.put(FILE_A, &batch_csv(&rows)).unwrap();

    harness
        .processor()
        .submit_file(FILE_A, "m-a", arrival(0))
        .unwrap();

    // The same filename arrives again under a fresh message id.
    harness.objects.put(FILE_A, &batch_csv(&rows)).unwrap();
    let reports = harness
        .processor()
        .submit_file(FILE_A, "m-b", arrival(1))
        .unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].disposition, FileDisposition::Duplicate);
    assert!(inf_ack_content(&harness.objects, FILE_A).contains("|Failure|"));
    // Only the first run touched the record store.
    let items = harness
        .repository
        .find_by_identifier(IDENTIFIER_SYSTEM, "0001")
        .unwrap();
    assert_eq!(items[0]["Version"], 1);
}

#[test]
fn row_failure_acks_fatal_without_stopping_siblings() {
    let harness = Harness::new();
    let rows = vec![valid_row("0001", "new"), valid_row("0002", "insert")];
    harness.objects.put(FILE_A, &batch_csv(&rows)).unwrap();

    let reports = harness
        .processor()
        .submit_file(FILE_A, "m-a", arrival(0))
        .unwrap();

    assert_eq!(reports[0].successful_rows, 1);
    assert_eq!(reports[0].failed_rows, 1);

    let ack = ack_content(&harness.objects, FILE_A, "20240904T18332500");
    let lines: Vec<&str> = ack.lines().collect();
    assert!(lines[1].contains("|OK|"));
    assert!(lines[2].contains("|Fatal Error|Fatal|"));
    assert!(lines[2].contains(
        "Invalid ACTION_FLAG - ACTION_FLAG must be 'NEW', 'UPDATE' or 'DELETE'"
    ));
    // Parity was still reached on the last row, so the file archived.
    assert!(harness.objects.exists(&format!("archive/{FILE_A}")).unwrap());
}

#[test]
fn create_update_delete_sequence_reconciles_the_store() {
    let harness = Harness::new();
    let rows = vec![
        valid_row("0001", "new"),
        valid_row("0001", "update"),
        valid_row("0001", "delete"),
    ];
    harness.objects.put(FILE_A, &batch_csv(&rows)).unwrap();

    let reports = harness
        .processor()
        .submit_file(FILE_A, "m-a", arrival(0))
        .unwrap();
    assert_eq!(reports[0].successful_rows, 3);
    assert_eq!(reports[0].failed_rows, 0);

    let items = harness
        .repository
        .find_by_identifier(IDENTIFIER_SYSTEM, "0001")
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["DeletionStatus"], "Deleted");
    assert_eq!(items[0]["Version"], 2);
    assert!(items[0]["DeletedAt"].is_string());
}

#[test]
fn update_of_unknown_record_acks_not_found() {
    let harness = Harness::new();
    let rows = vec![valid_row("0009", "update")];
    harness.objects.put(FILE_A, &batch_csv(&rows)).unwrap();

    let reports = harness
        .processor()
        .submit_file(FILE_A, "m-a", arrival(0))
        .unwrap();
    assert_eq!(reports[0].failed_rows, 1);

    let ack = ack_content(&harness.objects, FILE_A, "20240904T18332500");
    assert!(ack.contains("does not exist or has been deleted"));
}

#[test]
fn update_of_a_tombstoned_record_reinstates_it() {
    let harness = Harness::new();
    let first = vec![valid_row("0001", "new"), valid_row("0001", "delete")];
    harness.objects.put(FILE_A, &batch_csv(&first)).unwrap();
    harness
        .processor()
        .submit_file(FILE_A, "m-a", arrival(0))
        .unwrap();

    let second = vec![valid_row("0001", "update")];
    harness.objects.put(FILE_B, &batch_csv(&second)).unwrap();
    let reports = harness
        .processor()
        .submit_file(FILE_B, "m-b", arrival(1))
        .unwrap();
    assert_eq!(reports[0].successful_rows, 1);

    let items = harness
        .repository
        .find_by_identifier(IDENTIFIER_SYSTEM, "0001")
        .unwrap();
    assert_eq!(items[0]["DeletionStatus"], "Reinstated");
    assert!(items[0].get("DeletedAt").is_none());
}

#[test]
fn no_permission_for_any_requested_operation_rejects_the_file() {
    let harness = Harness::new();
    let flu_key = "FLU_Vaccinations_v5_YGM41_20240904T18332500.csv";
    // EMIS only holds FLU_CREATE; the file only requests deletes.
    let rows = vec![valid_row("0001", "delete")];
    harness.objects.put(flu_key, &batch_csv(&rows)).unwrap();

    let reports = harness
        .processor()
        .submit_file(flu_key, "m-a", arrival(0))
        .unwrap();

    assert_eq!(reports[0].disposition, FileDisposition::Rejected);
    assert!(harness.objects.exists(&format!("archive/{flu_key}")).unwrap());
    assert!(inf_ack_content(&harness.objects, flu_key).contains("|Failure|"));
    assert!(harness.publisher.published().is_empty());
}

#[test]
fn mismatched_headers_reject_the_file() {
    let harness = Harness::new();
    harness
        .objects
        .put(FILE_A, b"NHS_NUMBER|PERSON_FORENAME\n123|Mary\n")
        .unwrap();

    let reports = harness
        .processor()
        .submit_file(FILE_A, "m-a", arrival(0))
        .unwrap();

    assert_eq!(reports[0].disposition, FileDisposition::Rejected);
    assert!(harness.objects.exists(&format!("archive/{FILE_A}")).unwrap());
    assert!(inf_ack_content(&harness.objects, FILE_A).contains("|Failure|"));
}

#[test]
fn invalid_file_key_is_rejected_without_an_audit_entry() {
    let harness = Harness::new();
    let bad_key = "Flu_Vaccinations_v4_YGM41_20240904T18332500.csv";
    harness.objects.put(bad_key, b"whatever").unwrap();

    let reports = harness
        .processor()
        .submit_file(bad_key, "m-a", arrival(0))
        .unwrap();
    assert_eq!(reports[0].disposition, FileDisposition::Rejected);
    assert!(inf_ack_content(&harness.objects, bad_key).contains("|Failure|"));
    // Rejected before registration: submitting again is another rejection,
    // not a duplicate.
    harness.objects.put(bad_key, b"whatever").unwrap();
    let reports = harness
        .processor()
        .submit_file(bad_key, "m-b", arrival(1))
        .unwrap();
    assert_eq!(reports[0].disposition, FileDisposition::Rejected);
}

#[test]
fn empty_file_archives_with_an_empty_ack() {
    let harness = Harness::new();
    harness.objects.put(FILE_A, &batch_csv(&[])).unwrap();

    let reports = harness
        .processor()
        .submit_file(FILE_A, "m-a", arrival(0))
        .unwrap();

    assert_eq!(reports[0].disposition, FileDisposition::Processed);
    assert_eq!(reports[0].total_rows, 0);
    assert!(harness.objects.exists(&format!("archive/{FILE_A}")).unwrap());
}

#[test]
fn arrival_behind_a_queued_file_waits_its_turn() {
    // FILE_B arrived earlier and is still waiting; its predecessor has
    // already completed. The new arrival must queue behind it, not jump it.
    let audit_store = MemoryStore::new();
    audit_store
        .conditional_put(
            "m-b",
            json!({
                "message_id": "m-b",
                "filename": FILE_B,
                "queue_name": "RAVS_RSV",
                "timestamp": "2024-09-04T18:00:00+00:00",
                "status": "Queued",
            }),
            Precondition::KeyAbsent,
        )
        .unwrap();
    let harness = Harness::with_audit_store(audit_store);
    let rows = vec![valid_row("0001", "new")];
    harness.objects.put(FILE_A, &batch_csv(&rows)).unwrap();

    let reports = harness
        .processor()
        .submit_file(FILE_A, "m-a", arrival(0))
        .unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].disposition, FileDisposition::Queued);
    assert!(harness.objects.exists(FILE_A).unwrap());
    assert!(harness.publisher.published().is_empty());
}

#[test]
fn draining_a_queue_runs_waiting_files_in_arrival_order() {
    let audit_store = MemoryStore::new();
    audit_store
        .conditional_put(
            "m-b",
            json!({
                "message_id": "m-b",
                "filename": FILE_B,
                "queue_name": "RAVS_RSV",
                "timestamp": "2024-09-04T18:00:00+00:00",
                "status": "Queued",
            }),
            Precondition::KeyAbsent,
        )
        .unwrap();
    let harness = Harness::with_audit_store(audit_store);

    let rows_b = vec![valid_row("0002", "new")];
    harness.objects.put(FILE_B, &batch_csv(&rows_b)).unwrap();
    let rows_a = vec![valid_row("0001", "new")];
    harness.objects.put(FILE_A, &batch_csv(&rows_a)).unwrap();

    // FILE_A arrives behind the waiting FILE_B and queues.
    let reports = harness
        .processor()
        .submit_file(FILE_A, "m-a", arrival(0))
        .unwrap();
    assert_eq!(reports[0].disposition, FileDisposition::Queued);

    // Hand-off: the earliest queued file runs first, then pulls FILE_A
    // through behind it.
    let reports = harness.processor().drain_queue("RAVS_RSV").unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].file_key, FILE_B);
    assert_eq!(reports[0].disposition, FileDisposition::Processed);
    assert_eq!(reports[1].file_key, FILE_A);
    assert_eq!(reports[1].disposition, FileDisposition::Processed);
    assert!(harness.objects.exists(&format!("archive/{FILE_A}")).unwrap());
    assert!(harness.objects.exists(&format!("archive/{FILE_B}")).unwrap());

    // Each file's ack is stamped from its own audit timestamp.
    assert!(
        harness
            .objects
            .exists(&ack_file_key(FILE_B, "20240904T18000000"))
            .unwrap()
    );
    assert!(
        harness
            .objects
            .exists(&ack_file_key(FILE_A, "20240904T18332500"))
            .unwrap()
    );

    // Nothing left waiting.
    assert!(harness.processor().drain_queue("RAVS_RSV").unwrap().is_empty());
}

#[test]
fn file_behind_a_processing_entry_queues() {
    let audit_store = MemoryStore::new();
    audit_store
        .conditional_put(
            "m-a",
            json!({
                "message_id": "m-a",
                "filename": FILE_A,
                "queue_name": "RAVS_RSV",
                "timestamp": "2024-09-04T18:00:00+00:00",
                "status": "Processing",
            }),
            Precondition::KeyAbsent,
        )
        .unwrap();
    let harness = Harness::with_audit_store(audit_store);
    let rows = vec![valid_row("0002", "new")];
    harness.objects.put(FILE_B, &batch_csv(&rows)).unwrap();

    let reports = harness
        .processor()
        .submit_file(FILE_B, "m-b", arrival(1))
        .unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].disposition, FileDisposition::Queued);
    // Untouched until its turn comes.
    assert!(harness.objects.exists(FILE_B).unwrap());
    assert!(harness.publisher.published().is_empty());
}

//! Subcommand implementations.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;

use imms_batch::file_key::ODS_TO_SUPPLIER_MAPPINGS;
use imms_batch::{BatchProcessor, NullPublisher, ObjectStore};
use imms_model::VaccineType;
use imms_store::{AuditTable, ImmunizationRepository, MemoryStore};

use crate::cli::ProcessArgs;
use crate::fs_store::FsObjectStore;
use crate::summary::print_suppliers;
use crate::types::ProcessResult;

/// Run every batch file in the input folder through the pipeline, in
/// filename order. Audit and record state live for the duration of the run;
/// the object store (acks, archives) persists under the store directory.
pub fn run_process(args: &ProcessArgs) -> anyhow::Result<ProcessResult> {
    let store_dir = args
        .store_dir
        .clone()
        .unwrap_or_else(|| args.input_folder.join("store"));
    fs::create_dir_all(&store_dir)
        .with_context(|| format!("creating store directory {}", store_dir.display()))?;

    let objects = FsObjectStore::new(store_dir.clone());
    let audit = AuditTable::new(MemoryStore::new());
    let repository = ImmunizationRepository::new(MemoryStore::new());
    let publisher = NullPublisher;
    let permissions = load_permissions(args.permissions.as_deref())?;
    let processor = BatchProcessor::new(&objects, &audit, &repository, &publisher, permissions);

    let files = discover_batch_files(&args.input_folder)?;
    if files.is_empty() {
        tracing::warn!(folder = %args.input_folder.display(), "no batch files found");
    }

    let mut reports = Vec::new();
    let mut errors = Vec::new();
    for (index, (name, path)) in files.iter().enumerate() {
        let body =
            fs::read(path).with_context(|| format!("reading batch file {}", path.display()))?;
        if let Err(err) = objects.put(name, &body) {
            errors.push(format!("{name}: {err}"));
            continue;
        }
        let arrived_at = Utc::now();
        let message_id = format!("{}-{:04}", arrived_at.format("%Y%m%dT%H%M%S%3f"), index + 1);
        match processor.submit_file(name, &message_id, arrived_at) {
            Ok(handled) => reports.extend(handled),
            Err(err) => errors.push(format!("{name}: {err}")),
        }
    }

    Ok(ProcessResult {
        store_dir,
        reports,
        errors,
    })
}

/// Print the ODS whitelist.
pub fn run_suppliers() {
    print_suppliers(&ODS_TO_SUPPLIER_MAPPINGS);
}

/// The batch files in the folder, sorted by filename so embedded timestamps
/// give a stable submission order.
fn discover_batch_files(folder: &Path) -> anyhow::Result<Vec<(String, PathBuf)>> {
    let entries = fs::read_dir(folder)
        .with_context(|| format!("reading input folder {}", folder.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_batch = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv") || ext.eq_ignore_ascii_case("dat"));
        if !is_batch {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        files.push((name.to_string(), path.clone()));
    }
    files.sort();
    Ok(files)
}

/// Load the supplier permission map, or grant every whitelisted supplier
/// full permissions for every vaccine type when no file is given.
fn load_permissions(path: Option<&Path>) -> anyhow::Result<BTreeMap<String, Vec<String>>> {
    match path {
        Some(path) => {
            let content = fs::read(path)
                .with_context(|| format!("reading permissions file {}", path.display()))?;
            serde_json::from_slice(&content)
                .with_context(|| format!("parsing permissions file {}", path.display()))
        }
        None => {
            let full: Vec<String> = VaccineType::ALL
                .iter()
                .map(|vaccine| vaccine.full_permission())
                .collect();
            Ok(ODS_TO_SUPPLIER_MAPPINGS
                .iter()
                .map(|(_, supplier)| ((*supplier).to_string(), full.clone()))
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_permissions_cover_every_supplier_and_vaccine() {
        let permissions = load_permissions(None).unwrap();
        assert!(permissions.contains_key("EMIS"));
        assert!(permissions.contains_key("RAVS"));
        let emis = &permissions["EMIS"];
        for vaccine in VaccineType::ALL {
            assert!(emis.contains(&vaccine.full_permission()));
        }
    }

    #[test]
    fn discovery_is_sorted_and_extension_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.csv"), "x").unwrap();
        fs::write(dir.path().join("a.DAT"), "x").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let files = discover_batch_files(dir.path()).unwrap();
        let names: Vec<&str> = files.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["a.DAT", "b.csv"]);
    }
}

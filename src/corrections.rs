//! Operator-correction store.
//!
//! Corrections pair what a scan read with what the operator says the line
//! actually was, one JSON object per line. The store is read once at
//! startup and shared immutably; `record` only appends, for offline
//! template tuning. Store failures are never fatal to a request.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Correction {
    /// Request id the observation came from
    pub id: String,
    /// Operator-supplied ground truth
    pub actual: String,
    /// What the scan read
    pub value: String,
}

pub struct CorrectionStore {
    entries: Vec<Correction>,
    writer: Option<Mutex<File>>,
    path: Option<PathBuf>,
}

impl CorrectionStore {
    /// A store that accepts and drops everything.
    pub fn disabled() -> Self {
        Self {
            entries: Vec::new(),
            writer: None,
            path: None,
        }
    }

    /// Load existing corrections and open the file for appending.
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => p,
            None => return Self::disabled(),
        };

        let mut entries = Vec::new();
        if let Ok(file) = File::open(path) {
            for line in BufReader::new(file).lines().map_while(Result::ok) {
                match serde_json::from_str::<Correction>(&line) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => tracing::warn!("skipping bad correction line: {e}"),
                }
            }
        }

        let writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| tracing::warn!("corrections store unavailable: {e}"))
            .ok()
            .map(Mutex::new);

        tracing::info!("loaded {} corrections from {}", entries.len(), path.display());
        Self {
            entries,
            writer,
            path: Some(path.to_path_buf()),
        }
    }

    pub fn entries(&self) -> &[Correction] {
        &self.entries
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one correction. Failures are logged and swallowed.
    pub fn record(&self, correction: &Correction) {
        let Some(writer) = &self.writer else {
            return;
        };
        let line = match serde_json::to_string(correction) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!("failed to serialize correction: {e}");
                return;
            }
        };
        match writer.lock() {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{line}") {
                    tracing::warn!("failed to append correction: {e}");
                }
            }
            Err(e) => tracing::warn!("corrections writer poisoned: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_store_swallows_records() {
        let store = CorrectionStore::disabled();
        store.record(&Correction {
            id: "r1".into(),
            actual: "T123T".into(),
            value: "T128T".into(),
        });
        assert!(store.entries().is_empty());
    }

    #[test]
    fn load_reads_appended_entries_back() {
        let dir = std::env::temp_dir().join("micr-scan-corrections-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("corrections.jsonl");
        let _ = std::fs::remove_file(&path);

        let store = CorrectionStore::load(Some(&path));
        let entry = Correction {
            id: "r1".into(),
            actual: "T123T456U789".into(),
            value: "T128T456U789".into(),
        };
        store.record(&entry);
        drop(store);

        let reloaded = CorrectionStore::load(Some(&path));
        assert_eq!(reloaded.entries(), &[entry]);
        let _ = std::fs::remove_file(&path);
    }
}

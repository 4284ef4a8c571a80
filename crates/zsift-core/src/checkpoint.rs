//! Resume support: persisted record of fully processed dump files.

use std::io;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use serde::Deserialize;

use crate::discover::DumpFile;

/// On-disk checkpoint shape: `{"processed_files": [...], "last_updated": secs}`.
#[derive(Debug, Default, Deserialize)]
struct CheckpointData {
    #[serde(default)]
    processed_files: Vec<String>,
}

/// Set of fully processed file ids, rewritten to disk on every mark.
///
/// The set only grows during a run. A crash loses at most the mark for the
/// file that was in flight.
pub struct CheckpointStore {
    path: PathBuf,
    processed: FxHashSet<String>,
}

impl CheckpointStore {
    /// Load an existing checkpoint. A missing or corrupt file means nothing
    /// has been processed; that is a warning, never fatal.
    pub fn load(path: &Path) -> Self {
        let processed = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<CheckpointData>(&content) {
                Ok(data) => {
                    log::info!(
                        "Loaded checkpoint: {} files already processed",
                        data.processed_files.len()
                    );
                    data.processed_files.into_iter().collect()
                }
                Err(e) => {
                    log::warn!("Failed to parse checkpoint {}: {e}", path.display());
                    FxHashSet::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => FxHashSet::default(),
            Err(e) => {
                log::warn!("Failed to read checkpoint {}: {e}", path.display());
                FxHashSet::default()
            }
        };
        Self {
            path: path.to_path_buf(),
            processed,
        }
    }

    pub fn is_processed(&self, id: &str) -> bool {
        self.processed.contains(id)
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// Record a completed file and persist synchronously. The write goes to a
    /// tmp file renamed into place, so a crash cannot corrupt the checkpoint.
    pub fn mark_processed(&mut self, id: &str) {
        self.processed.insert(id.to_string());
        if let Err(e) = self.save() {
            log::error!("Failed to save checkpoint {}: {e}", self.path.display());
        }
    }

    fn save(&self) -> io::Result<()> {
        let mut files: Vec<&String> = self.processed.iter().collect();
        files.sort();
        let data = serde_json::json!({
            "processed_files": files,
            "last_updated": chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        });
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&data)?)?;
        std::fs::rename(&tmp, &self.path)
    }

    /// Enumerated files not yet processed, in enumeration order.
    pub fn pending(&self, all: Vec<DumpFile>) -> Vec<DumpFile> {
        all.into_iter()
            .filter(|f| !self.is_processed(&f.id))
            .collect()
    }
}

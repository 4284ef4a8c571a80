//! Input file enumeration.

use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;

/// A dump file slated for processing. The id doubles as the checkpoint key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpFile {
    pub path: PathBuf,
    pub id: String,
}

impl DumpFile {
    pub fn new(path: PathBuf) -> Self {
        let id = path.to_string_lossy().into_owned();
        Self { path, id }
    }

    /// Base name for log lines.
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.id)
    }
}

/// Recursively collect dump files under `root`.
///
/// Directory entries are visited in sorted order (files of a directory first,
/// then its subdirectories), so the enumeration is deterministic. A file is
/// kept when its name ends with `extension` and matches `file_filter`
/// (unanchored search).
pub fn collect_input_files(
    root: &Path,
    file_filter: &Regex,
    extension: &str,
) -> io::Result<Vec<DumpFile>> {
    let mut files = Vec::new();
    walk(root, file_filter, extension, &mut files)?;
    Ok(files)
}

fn walk(
    dir: &Path,
    file_filter: &Regex,
    extension: &str,
    out: &mut Vec<DumpFile>,
) -> io::Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<_>>()?;
    entries.sort();

    let mut subdirs = Vec::new();
    for path in entries {
        if path.is_dir() {
            subdirs.push(path);
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.ends_with(extension) && file_filter.is_match(name) {
            out.push(DumpFile::new(path));
        }
    }
    for subdir in subdirs {
        walk(&subdir, file_filter, extension, out)?;
    }
    Ok(())
}

//! Recursive discovery of candidate files under an input root
//!
//! Entry kinds come from the filesystem, never from the shape of the name:
//! a directory called `album.` or `mix.mp3` is still a directory. Only
//! regular files are candidates. Symlinks are not followed, so every
//! physical file is reached through exactly one path, and FIFOs, sockets
//! and device nodes are never opened.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::ScanError;

/// Substring every candidate file name must contain by default
pub const DEFAULT_NAME_FILTER: &str = "mp3";

/// A candidate file found by the scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Full path to the file
    pub path: PathBuf,
    /// Directory that contains the file
    pub dir: PathBuf,
    /// File name (lossily converted if not valid UTF-8)
    pub name: String,
}

impl FileRecord {
    /// Directory of this file relative to the scan root.
    ///
    /// Returns an empty path for files directly inside the root.
    pub fn relative_dir(&self, root: &Path) -> &Path {
        self.dir.strip_prefix(root).unwrap_or(Path::new(""))
    }
}

/// Name predicate used to select candidate files.
///
/// Matching is a case-sensitive substring test, not a suffix test, so
/// `song.mp3.bak` and `mp3_dump_0001` are picked up as well.
pub fn matches_name(name: &str, filter: &str) -> bool {
    name.contains(filter)
}

/// Directory scanner with a configurable name filter
#[derive(Debug, Clone)]
pub struct Scanner {
    name_filter: String,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(DEFAULT_NAME_FILTER)
    }
}

impl Scanner {
    pub fn new(name_filter: impl Into<String>) -> Self {
        Self {
            name_filter: name_filter.into(),
        }
    }

    pub fn name_filter(&self) -> &str {
        &self.name_filter
    }

    /// Enumerate every matching file below `root`, sorted by file name.
    ///
    /// Only a failure to read `root` itself is an error. Unreadable
    /// subdirectories are logged and skipped.
    pub fn scan(&self, root: &Path) -> Result<Vec<FileRecord>, ScanError> {
        tracing::info!("Scanning {} for names containing {:?}", root.display(), self.name_filter);

        // WalkDir yields a file root as its own entry, so the root is
        // opened as a directory first and its failure surfaces as ScanError.
        fs::read_dir(root).map_err(|source| ScanError {
            path: root.to_path_buf(),
            source,
        })?;

        let mut records = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                if entry.path_is_symlink() {
                    tracing::debug!("Not following link {}", entry.path().display());
                }
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if !matches_name(&name, &self.name_filter) {
                continue;
            }

            let path = entry.into_path();
            let dir = path.parent().unwrap_or(root).to_path_buf();
            records.push(FileRecord { path, dir, name });
        }

        records.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));

        tracing::info!("Found {} candidate files under {}", records.len(), root.display());
        Ok(records)
    }
}

/// Scan `root` with the default `mp3` name filter.
pub fn scan(root: &Path) -> Result<Vec<FileRecord>, ScanError> {
    Scanner::default().scan(root)
}

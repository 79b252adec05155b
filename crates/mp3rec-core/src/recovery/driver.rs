/// Batch recovery: scan, read tags, resolve, name and copy
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::{
    error::{RecoveryError, ScanError},
    naming::{build_output_path, next_free_path, CollisionPolicy},
    recovery::{
        fs_ops::{FileOps, StdFileOps},
        report::{FileRecoveryResult, RecoveryReport, RecoveryStatus},
        verification::verify_copy,
    },
    resolve::ResolvedTag,
    scanner::{FileRecord, Scanner, DEFAULT_NAME_FILTER},
    tags::FileTags,
};

/// Recovery run configuration
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Substring a file name must contain to be considered
    pub name_filter: String,
    pub collision_policy: CollisionPolicy,
    /// Hash source and copy after writing
    pub verify_copies: bool,
    /// Resolve and name files without writing anything
    pub dry_run: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            name_filter: DEFAULT_NAME_FILTER.to_string(),
            collision_policy: CollisionPolicy::Overwrite,
            verify_copies: false,
            dry_run: false,
        }
    }
}

/// Progress notification sent after each file
#[derive(Debug, Clone)]
pub struct RecoveryProgress {
    /// Files processed so far, including this one
    pub processed: usize,
    pub total: usize,
    pub recovered: u64,
    pub file: FileRecoveryResult,
}

/// Drives a recovery run and owns its counters
pub struct RecoveryDriver<F: FileOps = StdFileOps> {
    config: RecoveryConfig,
    file_ops: F,
    scanned: u64,
    recovered: u64,
    failed: u64,
    /// Running number of resolved files, used in output names
    sequence: u64,
    progress_callback: Option<Box<dyn Fn(&RecoveryProgress) + Send + Sync>>,
}

impl RecoveryDriver<StdFileOps> {
    pub fn new(config: RecoveryConfig) -> Self {
        Self::with_file_ops(config, StdFileOps)
    }
}

impl<F: FileOps> RecoveryDriver<F> {
    pub fn with_file_ops(config: RecoveryConfig, file_ops: F) -> Self {
        Self {
            config,
            file_ops,
            scanned: 0,
            recovered: 0,
            failed: 0,
            sequence: 0,
            progress_callback: None,
        }
    }

    pub fn set_progress_callback<C>(&mut self, callback: C)
    where
        C: Fn(&RecoveryProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    pub fn scanned(&self) -> u64 {
        self.scanned
    }

    pub fn recovered(&self) -> u64 {
        self.recovered
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Scan `input_root` and recover every candidate into `output_root`.
    ///
    /// Only a failure to read `input_root` is returned as an error; every
    /// per-file problem is recorded in the report instead.
    pub fn run(&mut self, input_root: &Path, output_root: &Path) -> Result<RecoveryReport, ScanError> {
        self.scanned = 0;
        self.recovered = 0;
        self.failed = 0;
        self.sequence = 0;

        let records = Scanner::new(self.config.name_filter.clone()).scan(input_root)?;
        Ok(self.run_records(&records, input_root, output_root))
    }

    /// Recover an already scanned list of files.
    pub fn run_records(
        &mut self,
        records: &[FileRecord],
        input_root: &Path,
        output_root: &Path,
    ) -> RecoveryReport {
        let started_at = Utc::now();
        tracing::info!(
            "Recovering {} files from {} into {}",
            records.len(),
            input_root.display(),
            output_root.display()
        );

        let mut files = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let result = self.process_file(record, input_root, output_root);

            if let Some(callback) = &self.progress_callback {
                callback(&RecoveryProgress {
                    processed: i + 1,
                    total: records.len(),
                    recovered: self.recovered,
                    file: result.clone(),
                });
            }
            files.push(result);
        }

        let report = RecoveryReport {
            input_root: input_root.to_path_buf(),
            output_root: output_root.to_path_buf(),
            started_at,
            finished_at: Utc::now(),
            scanned: self.scanned,
            recovered: self.recovered,
            failed: self.failed,
            files,
        };

        tracing::info!("Recovery complete: {}", report.summary());
        report
    }

    /// Take one file from scanned to recovered or skipped.
    pub fn process_file(
        &mut self,
        record: &FileRecord,
        input_root: &Path,
        output_root: &Path,
    ) -> FileRecoveryResult {
        self.scanned += 1;

        let tags = match read_tags(&record.path) {
            Ok(tags) => tags,
            Err(e) => {
                tracing::warn!("{}", e);
                return FileRecoveryResult::skipped(record.path.clone(), e.to_string());
            }
        };

        let tag_source = tags.source();
        let resolved = ResolvedTag::from(&tags);
        if !resolved.is_recovered() {
            tracing::info!("Skipping {}: no artist or title ({})", record.path.display(), tag_source);
            let mut result = FileRecoveryResult::skipped(record.path.clone(), "no artist or title tags");
            result.tag_source = Some(tag_source);
            return result;
        }

        self.sequence += 1;
        let sequence = self.sequence;

        let mut result = FileRecoveryResult {
            source_path: record.path.clone(),
            tag_source: Some(tag_source),
            resolved: Some(resolved.clone()),
            sequence: Some(sequence),
            status: RecoveryStatus::Skipped {
                reason: String::new(),
            },
            sha256: None,
        };

        let relative_dir = record.relative_dir(input_root);
        let Some(output_path) = build_output_path(output_root, relative_dir, &resolved, sequence)
        else {
            result.status = RecoveryStatus::Skipped {
                reason: "no artist or title tags".to_string(),
            };
            return result;
        };

        if self.config.dry_run {
            self.recovered += 1;
            tracing::info!(
                "{}. {} - {} -> {} (dry run)",
                sequence,
                resolved.artist(),
                resolved.title(),
                output_path.display()
            );
            result.status = RecoveryStatus::Planned { output_path };
            return result;
        }

        match self.write_output(&record.path, output_path) {
            Ok((output_path, sha256)) => {
                self.recovered += 1;
                tracing::info!("{}. {} - {}", sequence, resolved.artist(), resolved.title());
                result.status = RecoveryStatus::Recovered { output_path };
                result.sha256 = sha256;
            }
            Err(e) => {
                self.failed += 1;
                tracing::warn!("Failed to recover {}: {}", record.path.display(), e);
                result.status = RecoveryStatus::Failed {
                    reason: e.to_string(),
                };
            }
        }
        result
    }

    /// Ensure the parent directory, copy, and optionally verify.
    fn write_output(
        &self,
        src: &Path,
        output_path: PathBuf,
    ) -> Result<(PathBuf, Option<String>), RecoveryError> {
        if let Some(parent) = output_path.parent() {
            self.file_ops
                .ensure_dir(parent)
                .map_err(|source| RecoveryError::DirCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        // Copying a file onto itself would truncate it.
        if is_same_file(src, &output_path) {
            tracing::info!("{} already has its recovered name, leaving it in place", src.display());
            let sha256 = if self.config.verify_copies {
                Some(verify_copy(src, &output_path)?)
            } else {
                None
            };
            return Ok((output_path, sha256));
        }

        let output_path = match self.config.collision_policy {
            CollisionPolicy::Overwrite => {
                if output_path.exists() {
                    tracing::warn!("Overwriting existing {}", output_path.display());
                }
                output_path
            }
            CollisionPolicy::Suffix => next_free_path(&output_path),
        };

        let bytes = self
            .file_ops
            .copy_bytes(src, &output_path)
            .map_err(|source| RecoveryError::Copy {
                src: src.to_path_buf(),
                dest: output_path.clone(),
                source,
            })?;
        tracing::debug!("Copied {} bytes to {}", bytes, output_path.display());

        let sha256 = if self.config.verify_copies {
            Some(verify_copy(src, &output_path)?)
        } else {
            None
        };

        Ok((output_path, sha256))
    }
}

/// Whether `dest` exists and is the same file as `src`, through a link or
/// a different spelling of the path.
fn is_same_file(src: &Path, dest: &Path) -> bool {
    let (Ok(a), Ok(b)) = (fs::metadata(src), fs::metadata(dest)) else {
        return false;
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        if a.dev() == b.dev() && a.ino() == b.ino() {
            return true;
        }
    }
    #[cfg(not(unix))]
    let _ = (a, b);

    matches!(
        (fs::canonicalize(src), fs::canonicalize(dest)),
        (Ok(a), Ok(b)) if a == b
    )
}

/// Open a file and run both tag readers on the same handle.
///
/// The handle is closed before returning.
fn read_tags(path: &Path) -> Result<FileTags, RecoveryError> {
    let mut file = File::open(path).map_err(|source| RecoveryError::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;
    FileTags::read(&mut file).map_err(|source| RecoveryError::TagRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Per-run and per-file recovery results
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resolve::ResolvedTag;
use crate::tags::TagSource;

/// Outcome for a single scanned file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecoveryStatus {
    /// Copied under its recovered name
    Recovered { output_path: PathBuf },
    /// Resolved and named, but nothing written (dry run)
    Planned { output_path: PathBuf },
    /// Unreadable or untagged; nothing written
    Skipped { reason: String },
    /// Resolved, but the output could not be written or verified
    Failed { reason: String },
}

/// Result entry for one scanned file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecoveryResult {
    pub source_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_source: Option<TagSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<ResolvedTag>,
    /// Running number assigned when the file resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    pub status: RecoveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl FileRecoveryResult {
    pub fn skipped(source_path: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            source_path,
            tag_source: None,
            resolved: None,
            sequence: None,
            status: RecoveryStatus::Skipped {
                reason: reason.into(),
            },
            sha256: None,
        }
    }

    pub fn is_recovered(&self) -> bool {
        matches!(
            self.status,
            RecoveryStatus::Recovered { .. } | RecoveryStatus::Planned { .. }
        )
    }
}

/// Summary of a whole recovery run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryReport {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub scanned: u64,
    pub recovered: u64,
    pub failed: u64,
    pub files: Vec<FileRecoveryResult>,
}

impl RecoveryReport {
    /// Recovered share of scanned files, in percent. Zero for an empty run.
    pub fn recovery_rate(&self) -> f64 {
        recovery_rate(self.recovered, self.scanned)
    }

    pub fn skipped(&self) -> u64 {
        self.scanned - self.recovered - self.failed
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// One-line summary: `scanned: N, recovered: M (P.PP%)`
    pub fn summary(&self) -> String {
        format!(
            "scanned: {}, recovered: {} ({:.2}%)",
            self.scanned,
            self.recovered,
            self.recovery_rate()
        )
    }
}

/// `recovered / scanned * 100`, or 0.0 when nothing was scanned
pub fn recovery_rate(recovered: u64, scanned: u64) -> f64 {
    if scanned == 0 {
        return 0.0;
    }
    recovered as f64 / scanned as f64 * 100.0
}

/// Error types for scanning and per-file recovery
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The input root could not be enumerated. Fatal for the whole run.
#[derive(Debug, Error)]
#[error("can't open directory {}: {source}", path.display())]
pub struct ScanError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Failure local to a single candidate file.
///
/// None of these abort a batch; the driver records them against the file
/// and moves on to the next one.
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("error opening file {}: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error reading tags from {}: {source}", path.display())]
    TagRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("can't create directory {}: {source}", path.display())]
    DirCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("can't copy {} to {}: {source}", src.display(), dest.display())]
    Copy {
        src: PathBuf,
        dest: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("copy of {} does not match source ({expected} != {actual})", dest.display())]
    Verification {
        dest: PathBuf,
        expected: String,
        actual: String,
    },
}

/// Structural problems inside an ID3v2 tag.
///
/// Any of these makes the rest of the frame directory unreadable, so the
/// reader reports no frames for that file.
#[derive(Debug, Error)]
pub enum TagError {
    #[error("frame {id} declares {size} bytes but only {remaining} remain in the tag")]
    MalformedFrame {
        id: String,
        size: usize,
        remaining: usize,
    },

    #[error("frame {id} at tag offset {offset} has a size that is not syncsafe")]
    InvalidFrameSize { id: String, offset: usize },

    #[error("invalid frame id at tag offset {offset}")]
    InvalidFrameId { offset: usize },

    #[error("extended header of {size} bytes runs past the end of the tag")]
    MalformedExtendedHeader { size: usize },
}

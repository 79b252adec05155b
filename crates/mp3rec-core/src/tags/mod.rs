/// Tag readers for the two on-disk formats
pub mod genre;
pub mod id3v1;
pub mod id3v2;

use std::fmt;
use std::io::{self, Read, Seek};

use serde::{Deserialize, Serialize};

pub use genre::{genre_name, GENRES};
pub use id3v1::{read_legacy, LegacyTag};
pub use id3v2::{read_extended, ExtendedFrame, TextEncoding, FRAME_ARTIST, FRAME_TITLE};

/// Which tag formats were found in a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagSource {
    Absent,
    Legacy,
    Extended,
    Both,
}

impl fmt::Display for TagSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagSource::Absent => write!(f, "no tags"),
            TagSource::Legacy => write!(f, "ID3v1"),
            TagSource::Extended => write!(f, "ID3v2"),
            TagSource::Both => write!(f, "ID3v2+ID3v1"),
        }
    }
}

/// Everything both readers extracted from one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTags {
    pub extended: Vec<ExtendedFrame>,
    pub legacy: Option<LegacyTag>,
}

impl FileTags {
    /// Run the extended reader first, then the legacy reader, on one handle.
    pub fn read<R: Read + Seek>(reader: &mut R) -> io::Result<Self> {
        let extended = read_extended(reader)?;
        let legacy = read_legacy(reader)?;
        Ok(Self { extended, legacy })
    }

    pub fn source(&self) -> TagSource {
        match (!self.extended.is_empty(), self.legacy.is_some()) {
            (false, false) => TagSource::Absent,
            (false, true) => TagSource::Legacy,
            (true, false) => TagSource::Extended,
            (true, true) => TagSource::Both,
        }
    }

    /// Text of the first frame with the given id
    pub fn frame_text(&self, id: &str) -> Option<&str> {
        self.extended
            .iter()
            .find(|frame| frame.id == id)
            .map(|frame| frame.text.as_str())
    }
}

/// Merge of extended and legacy tag values into one artist/title pair
use serde::{Deserialize, Serialize};

use crate::tags::{ExtendedFrame, FileTags, LegacyTag, FRAME_ARTIST, FRAME_TITLE};

/// Best-effort artist and title for one file.
///
/// `None` means no source supplied a non-empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTag {
    pub artist: Option<String>,
    pub title: Option<String>,
}

impl ResolvedTag {
    pub fn new(artist: Option<String>, title: Option<String>) -> Self {
        Self {
            artist: non_empty(artist),
            title: non_empty(title),
        }
    }

    /// A file counts as recovered when at least one field is known.
    pub fn is_recovered(&self) -> bool {
        self.artist.is_some() || self.title.is_some()
    }

    pub fn artist(&self) -> &str {
        self.artist.as_deref().unwrap_or("")
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }
}

/// Pick artist and title field by field: extended frames first, legacy
/// trailer as fallback.
pub fn resolve(extended: &[ExtendedFrame], legacy: Option<&LegacyTag>) -> ResolvedTag {
    let frame = |id: &str| {
        extended
            .iter()
            .find(|frame| frame.id == id)
            .map(|frame| frame.text.clone())
    };

    let artist = non_empty(frame(FRAME_ARTIST))
        .or_else(|| non_empty(legacy.map(|tag| tag.artist.clone())));
    let title = non_empty(frame(FRAME_TITLE))
        .or_else(|| non_empty(legacy.map(|tag| tag.title.clone())));

    ResolvedTag { artist, title }
}

impl From<&FileTags> for ResolvedTag {
    fn from(tags: &FileTags) -> Self {
        resolve(&tags.extended, tags.legacy.as_ref())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Output file naming from resolved tags
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::resolve::ResolvedTag;

/// Extension given to every recovered file
pub const OUTPUT_EXTENSION: &str = "mp3";

/// What to do when the computed output path already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollisionPolicy {
    /// Replace the existing file
    #[default]
    Overwrite,
    /// Append ` [n]` before the extension with the first free `n >= 2`
    Suffix,
}

/// Make tag text safe to use as a single path segment.
pub fn sanitize(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

/// File name for a resolved tag.
///
/// `counter` is the 1-based running number of resolved files; it only
/// appears when one of the two fields is missing. Returns `None` when
/// neither field is known.
pub fn output_file_name(resolved: &ResolvedTag, counter: u64) -> Option<String> {
    let artist = resolved.artist.as_deref().map(sanitize);
    let title = resolved.title.as_deref().map(sanitize);

    let name = match (artist, title) {
        (Some(artist), Some(title)) => format!("{} - {}.{}", artist, title, OUTPUT_EXTENSION),
        (None, Some(title)) => format!("{} ({}).{}", title, counter, OUTPUT_EXTENSION),
        (Some(artist), None) => format!("{} ({}).{}", artist, counter, OUTPUT_EXTENSION),
        (None, None) => return None,
    };
    Some(name)
}

/// Full output path: `out_root/relative_dir/<file name>`
pub fn build_output_path(
    out_root: &Path,
    relative_dir: &Path,
    resolved: &ResolvedTag,
    counter: u64,
) -> Option<PathBuf> {
    let name = output_file_name(resolved, counter)?;
    Some(out_root.join(relative_dir).join(name))
}

/// First path of the form `stem [n].ext` (n >= 2) that does not exist yet.
///
/// Returns `path` unchanged when it is free.
pub fn next_free_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (2u64..)
        .map(|n| path.with_file_name(format!("{} [{}]{}", stem, n, ext)))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

//! ID3v1 trailer parsing
//!
//! The trailer is the last 128 bytes of the file:
//! - 0..3: "TAG"
//! - 3..33: Title
//! - 33..63: Artist
//! - 63..93: Album
//! - 93..97: Year
//! - 97..127: Comment
//! - 127: Genre index

use std::io::{self, Read, Seek, SeekFrom};

use serde::Serialize;

use super::genre::genre_name;

/// Trailer size in bytes
pub const TRAILER_SIZE: u64 = 128;

/// Trailer signature
pub const SIGNATURE: &[u8; 3] = b"TAG";

const TITLE_LEN: usize = 30;
const ARTIST_LEN: usize = 30;
const ALBUM_LEN: usize = 30;
const YEAR_LEN: usize = 4;
const COMMENT_LEN: usize = 30;

/// Decoded ID3v1 trailer with every text field already cleaned
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LegacyTag {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
    pub comment: String,
    /// Raw genre byte
    pub genre_id: u8,
    /// Genre label, if the byte is inside the canonical table
    pub genre: Option<&'static str>,
}

/// Read the ID3v1 trailer from the end of `reader`.
///
/// Returns `Ok(None)` when the file is shorter than the trailer or the
/// signature does not match. Only the three signature bytes are read when
/// it doesn't.
pub fn read_legacy<R: Read + Seek>(reader: &mut R) -> io::Result<Option<LegacyTag>> {
    let len = reader.seek(SeekFrom::End(0))?;
    if len < TRAILER_SIZE {
        return Ok(None);
    }

    reader.seek(SeekFrom::Start(len - TRAILER_SIZE))?;

    let mut signature = [0u8; 3];
    reader.read_exact(&mut signature)?;
    if &signature != SIGNATURE {
        return Ok(None);
    }

    let mut body = [0u8; TRAILER_SIZE as usize - 3];
    reader.read_exact(&mut body)?;

    Ok(Some(parse_body(&body)))
}

/// Parse a full 128-byte trailer held in memory.
pub fn parse_legacy(trailer: &[u8]) -> Option<LegacyTag> {
    if trailer.len() != TRAILER_SIZE as usize || &trailer[0..3] != SIGNATURE {
        return None;
    }
    Some(parse_body(&trailer[3..]))
}

/// Fields after the signature, in fixed order
fn parse_body(body: &[u8]) -> LegacyTag {
    let (title, rest) = body.split_at(TITLE_LEN);
    let (artist, rest) = rest.split_at(ARTIST_LEN);
    let (album, rest) = rest.split_at(ALBUM_LEN);
    let (year, rest) = rest.split_at(YEAR_LEN);
    let (comment, rest) = rest.split_at(COMMENT_LEN);
    let genre_id = rest[0];

    LegacyTag {
        title: clean_field(title),
        artist: clean_field(artist),
        album: clean_field(album),
        year: clean_field(year),
        comment: clean_field(comment),
        genre_id,
        genre: genre_name(genre_id),
    }
}

/// Keep the printable ASCII prefix of a fixed-width slot.
///
/// Slots are usually NUL padded and sometimes padded with garbage; the
/// first NUL, control or non-ASCII byte ends the field.
pub fn clean_field(raw: &[u8]) -> String {
    let end = raw
        .iter()
        .position(|&b| !(0x20..=0x7E).contains(&b))
        .unwrap_or(raw.len());

    // Everything kept is ASCII, so this never replaces anything.
    String::from_utf8_lossy(&raw[..end]).trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn slot(text: &str, len: usize) -> Vec<u8> {
        let mut field = text.as_bytes().to_vec();
        field.resize(len, 0);
        field
    }

    fn trailer(title: &str, artist: &str, genre: u8) -> Vec<u8> {
        let mut data = SIGNATURE.to_vec();
        data.extend(slot(title, 30));
        data.extend(slot(artist, 30));
        data.extend(slot("Album", 30));
        data.extend(slot("1991", 4));
        data.extend(slot("", 30));
        data.push(genre);
        data
    }

    #[test]
    fn test_read_trailer_at_end_of_file() {
        let mut data = vec![0xFFu8; 4000];
        data.extend(trailer("One", "Metallica", 9));

        let tag = read_legacy(&mut Cursor::new(data)).unwrap().unwrap();
        assert_eq!(tag.title, "One");
        assert_eq!(tag.artist, "Metallica");
        assert_eq!(tag.album, "Album");
        assert_eq!(tag.year, "1991");
        assert_eq!(tag.comment, "");
        assert_eq!(tag.genre_id, 9);
        assert_eq!(tag.genre, Some("Metal"));
    }

    #[test]
    fn test_trailer_only_file() {
        let data = trailer("Imagine", "John Lennon", 13);
        let tag = read_legacy(&mut Cursor::new(data)).unwrap().unwrap();
        assert_eq!(tag.artist, "John Lennon");
        assert_eq!(tag.genre, Some("Pop"));
    }

    #[test]
    fn test_short_files_are_untagged() {
        for len in [0usize, 1, 3, 127] {
            let data = vec![b'T'; len];
            assert_eq!(read_legacy(&mut Cursor::new(data)).unwrap(), None);
        }
        // Even a short file that starts with the signature.
        let mut data = trailer("x", "y", 0);
        data.pop();
        assert_eq!(read_legacy(&mut Cursor::new(data)).unwrap(), None);
    }

    #[test]
    fn test_signature_mismatch_is_absent() {
        let mut data = trailer("One", "Metallica", 9);
        data[0] = b't';
        assert_eq!(read_legacy(&mut Cursor::new(data.clone())).unwrap(), None);
        assert_eq!(parse_legacy(&data), None);
    }

    #[test]
    fn test_mismatch_reads_only_signature() {
        let mut data = vec![0u8; 200];
        data[72..75].copy_from_slice(b"XYZ");
        let mut cursor = Cursor::new(data);

        assert_eq!(read_legacy(&mut cursor).unwrap(), None);
        assert_eq!(cursor.position(), 200 - TRAILER_SIZE + 3);
    }

    #[test]
    fn test_field_stops_at_garbage() {
        let mut raw = b"Queen".to_vec();
        raw.push(0);
        raw.extend(b"leftover junk");
        assert_eq!(clean_field(&raw), "Queen");

        assert_eq!(clean_field(b"Abc\x07def"), "Abc");
        assert_eq!(clean_field(b"Caf\xE9"), "Caf");
        assert_eq!(clean_field(b"Bohemian Rhapsody   "), "Bohemian Rhapsody");
        assert_eq!(clean_field(b"\0\0\0"), "");
    }

    #[test]
    fn test_unknown_genre_is_not_an_error() {
        let tag = parse_legacy(&trailer("t", "a", 200)).unwrap();
        assert_eq!(tag.genre_id, 200);
        assert_eq!(tag.genre, None);
    }
}

//! ID3v2 frame parsing
//!
//! The tag sits at the start of the file:
//! - 10-byte header: "ID3", major, revision, flags, syncsafe size
//! - optional extended header (flag 0x40)
//! - frames: 4-byte id, 4-byte size, 2 flag bytes, payload
//! - zero padding up to the declared size
//!
//! Versions 2.3 and 2.4 are understood. Only the artist (TPE1) and title
//! (TIT2) text frames are decoded; every other frame is stepped over
//! using its declared size.

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ByteOrder};
use encoding_rs::{UTF_16BE, UTF_16LE, UTF_8};
use serde::{Deserialize, Serialize};

use crate::error::TagError;

/// Header size in bytes
pub const HEADER_SIZE: usize = 10;

/// Frame header size in bytes (v2.3 and v2.4)
pub const FRAME_HEADER_SIZE: usize = 10;

/// Tag signature
pub const SIGNATURE: &[u8; 3] = b"ID3";

/// Lead artist frame
pub const FRAME_ARTIST: &str = "TPE1";
/// Title frame
pub const FRAME_TITLE: &str = "TIT2";

const WANTED_FRAMES: [&str; 2] = [FRAME_ARTIST, FRAME_TITLE];

/// Tag header flags
const FLAG_UNSYNCHRONISATION: u8 = 0x80;
const FLAG_EXTENDED_HEADER: u8 = 0x40;

/// v2.3 frame format flags
const V3_FRAME_COMPRESSED: u8 = 0x80;
const V3_FRAME_ENCRYPTED: u8 = 0x40;
const V3_FRAME_GROUPED: u8 = 0x20;

/// v2.4 frame format flags
const V4_FRAME_GROUPED: u8 = 0x40;
const V4_FRAME_COMPRESSED: u8 = 0x08;
const V4_FRAME_ENCRYPTED: u8 = 0x04;
const V4_FRAME_UNSYNCHRONISED: u8 = 0x02;
const V4_FRAME_DATA_LENGTH: u8 = 0x01;

/// Text encoding marker that precedes text frame payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    /// 0x00: ISO-8859-1
    Latin1,
    /// 0x01: UTF-16 with byte order mark
    Utf16,
    /// 0x02: UTF-16BE without byte order mark (v2.4)
    Utf16Be,
    /// 0x03: UTF-8 (v2.4)
    Utf8,
}

impl TextEncoding {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Latin1),
            0x01 => Some(Self::Utf16),
            0x02 => Some(Self::Utf16Be),
            0x03 => Some(Self::Utf8),
            _ => None,
        }
    }

    fn is_wide(self) -> bool {
        matches!(self, Self::Utf16 | Self::Utf16Be)
    }

    /// Decode `data` up to its first terminator
    pub fn decode(self, data: &[u8]) -> String {
        let data = first_value(data, self.is_wide());
        let text: String = match self {
            Self::Latin1 => data.iter().map(|&b| char::from(b)).collect(),
            // Sniffs the BOM and switches to big-endian when it says so.
            Self::Utf16 => UTF_16LE.decode(data).0.into_owned(),
            Self::Utf16Be => UTF_16BE.decode_without_bom_handling(data).0.into_owned(),
            Self::Utf8 => UTF_8.decode(data).0.into_owned(),
        };
        text.trim_matches(|c: char| c == '\0' || c.is_whitespace())
            .to_string()
    }
}

/// A decoded text frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedFrame {
    pub id: String,
    pub encoding: TextEncoding,
    pub text: String,
}

/// Parsed tag header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagHeader {
    pub major_version: u8,
    pub revision: u8,
    pub flags: u8,
    /// Size of everything after the header
    pub size: usize,
}

impl TagHeader {
    /// Parse the 10-byte header. Returns `None` if this is not a tag.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_SIZE || &data[0..3] != SIGNATURE {
            return None;
        }
        let size = syncsafe(&data[6..10])?;
        Some(Self {
            major_version: data[3],
            revision: data[4],
            flags: data[5],
            size: size as usize,
        })
    }

    pub fn is_supported(&self) -> bool {
        matches!(self.major_version, 3 | 4)
    }
}

/// Read the wanted text frames from the tag at the start of `reader`.
///
/// A missing, unsupported or structurally broken tag yields an empty list.
/// Only I/O failures are errors.
pub fn read_extended<R: Read + Seek>(reader: &mut R) -> io::Result<Vec<ExtendedFrame>> {
    reader.seek(SeekFrom::Start(0))?;

    let mut header = Vec::with_capacity(HEADER_SIZE);
    reader.by_ref().take(HEADER_SIZE as u64).read_to_end(&mut header)?;

    let header = match TagHeader::parse(&header) {
        Some(header) => header,
        None => return Ok(Vec::new()),
    };
    if !header.is_supported() {
        tracing::debug!("Ignoring ID3v2.{} tag", header.major_version);
        return Ok(Vec::new());
    }

    // A truncated file keeps whatever part of the tag survived. The declared
    // size is untrusted, so the buffer grows with what is actually read.
    let mut body = Vec::new();
    reader.by_ref().take(header.size as u64).read_to_end(&mut body)?;

    Ok(frames_or_empty(&header, &body))
}

/// Parse a complete in-memory tag, header included.
pub fn parse_extended(data: &[u8]) -> Vec<ExtendedFrame> {
    match TagHeader::parse(data) {
        Some(header) if header.is_supported() => {
            let end = data.len().min(HEADER_SIZE + header.size);
            frames_or_empty(&header, &data[HEADER_SIZE..end])
        }
        _ => Vec::new(),
    }
}

fn frames_or_empty(header: &TagHeader, body: &[u8]) -> Vec<ExtendedFrame> {
    match parse_frames(header, body) {
        Ok(frames) => frames,
        Err(e) => {
            tracing::warn!("Discarding ID3v2 tag: {}", e);
            Vec::new()
        }
    }
}

/// Walk the frame directory and decode the first TPE1 and TIT2 frames.
pub fn parse_frames(header: &TagHeader, body: &[u8]) -> Result<Vec<ExtendedFrame>, TagError> {
    let v4 = header.major_version == 4;

    // v2.3 unsynchronises the whole tag; v2.4 does it per frame.
    let owned;
    let body = if !v4 && header.flags & FLAG_UNSYNCHRONISATION != 0 {
        owned = remove_unsynchronisation(body);
        &owned[..]
    } else {
        body
    };

    let mut pos = 0;
    if header.flags & FLAG_EXTENDED_HEADER != 0 {
        pos = extended_header_len(body, v4)?;
    }

    let mut frames: Vec<ExtendedFrame> = Vec::new();

    while pos + FRAME_HEADER_SIZE <= body.len() {
        // Padding
        if body[pos] == 0 {
            break;
        }

        let raw_id = &body[pos..pos + 4];
        if !raw_id.iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
            return Err(TagError::InvalidFrameId { offset: pos });
        }
        let id = String::from_utf8_lossy(raw_id).into_owned();

        let size_bytes = &body[pos + 4..pos + 8];
        let size = if v4 {
            syncsafe(size_bytes).ok_or_else(|| TagError::InvalidFrameSize {
                id: id.clone(),
                offset: pos,
            })? as usize
        } else {
            BigEndian::read_u32(size_bytes) as usize
        };
        let format_flags = body[pos + 9];

        let start = pos + FRAME_HEADER_SIZE;
        let remaining = body.len() - start;
        if size > remaining {
            return Err(TagError::MalformedFrame { id, size, remaining });
        }
        pos = start + size;

        if !WANTED_FRAMES.contains(&id.as_str()) || frames.iter().any(|f| f.id == id) {
            continue;
        }

        let payload = &body[start..start + size];
        let unsynchronised = header.flags & FLAG_UNSYNCHRONISATION != 0;
        match frame_payload(payload, format_flags, v4, unsynchronised) {
            Some(payload) => {
                if let Some(frame) = decode_text_frame(&id, &payload) {
                    tracing::debug!("{} frame: {:?}", frame.id, frame.text);
                    frames.push(frame);
                }
            }
            None => tracing::debug!("Skipping compressed or encrypted {} frame", id),
        }
    }

    Ok(frames)
}

/// Strip per-frame extras and undo v2.4 unsynchronisation.
///
/// Returns `None` for compressed or encrypted frames, which are not decoded.
fn frame_payload(payload: &[u8], flags: u8, v4: bool, tag_unsync: bool) -> Option<Vec<u8>> {
    let (skip, unsync) = if v4 {
        if flags & (V4_FRAME_COMPRESSED | V4_FRAME_ENCRYPTED) != 0 {
            return None;
        }
        let mut skip = 0;
        if flags & V4_FRAME_GROUPED != 0 {
            skip += 1;
        }
        if flags & V4_FRAME_DATA_LENGTH != 0 {
            skip += 4;
        }
        (skip, tag_unsync || flags & V4_FRAME_UNSYNCHRONISED != 0)
    } else {
        if flags & (V3_FRAME_COMPRESSED | V3_FRAME_ENCRYPTED) != 0 {
            return None;
        }
        let skip = if flags & V3_FRAME_GROUPED != 0 { 1 } else { 0 };
        (skip, false)
    };

    let data = payload.get(skip..).unwrap_or(&[]);
    if unsync {
        Some(remove_unsynchronisation(data))
    } else {
        Some(data.to_vec())
    }
}

fn decode_text_frame(id: &str, payload: &[u8]) -> Option<ExtendedFrame> {
    let (&marker, text) = payload.split_first()?;
    let encoding = match TextEncoding::from_byte(marker) {
        Some(encoding) => encoding,
        None => {
            tracing::debug!("Unknown text encoding {:#04x} in {} frame", marker, id);
            return None;
        }
    };

    Some(ExtendedFrame {
        id: id.to_string(),
        encoding,
        text: encoding.decode(text),
    })
}

/// Length of the extended header, including its size field
fn extended_header_len(body: &[u8], v4: bool) -> Result<usize, TagError> {
    if body.len() < 4 {
        return Err(TagError::MalformedExtendedHeader { size: body.len() });
    }
    let len = if v4 {
        // v2.4 counts the size field itself.
        syncsafe(&body[0..4]).ok_or(TagError::MalformedExtendedHeader { size: body.len() })? as usize
    } else {
        BigEndian::read_u32(&body[0..4]) as usize + 4
    };
    if len > body.len() {
        return Err(TagError::MalformedExtendedHeader { size: len });
    }
    Ok(len)
}

/// First NUL-terminated value of a text payload
fn first_value(data: &[u8], wide: bool) -> &[u8] {
    let end = if wide {
        data.chunks_exact(2)
            .position(|pair| pair == [0u8, 0])
            .map(|i| i * 2)
    } else {
        data.iter().position(|&b| b == 0)
    };
    &data[..end.unwrap_or(data.len())]
}

/// Decode a 28-bit syncsafe integer (7 bits per byte)
pub fn syncsafe(bytes: &[u8]) -> Option<u32> {
    if bytes.len() != 4 || bytes.iter().any(|b| b & 0x80 != 0) {
        return None;
    }
    Some(bytes.iter().fold(0u32, |acc, &b| (acc << 7) | u32::from(b)))
}

/// Replace every `FF 00` pair with `FF`
pub fn remove_unsynchronisation(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut prev_ff = false;
    for &b in data {
        if prev_ff && b == 0 {
            prev_ff = false;
            continue;
        }
        out.push(b);
        prev_ff = b == 0xFF;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn syncsafe_bytes(n: u32) -> [u8; 4] {
        [
            ((n >> 21) & 0x7F) as u8,
            ((n >> 14) & 0x7F) as u8,
            ((n >> 7) & 0x7F) as u8,
            (n & 0x7F) as u8,
        ]
    }

    fn frame(version: u8, id: &str, payload: &[u8]) -> Vec<u8> {
        let mut data = id.as_bytes().to_vec();
        let size = payload.len() as u32;
        if version == 4 {
            data.extend(syncsafe_bytes(size));
        } else {
            data.extend(size.to_be_bytes());
        }
        data.extend([0, 0]);
        data.extend(payload);
        data
    }

    fn text(encoding: u8, body: &[u8]) -> Vec<u8> {
        let mut payload = vec![encoding];
        payload.extend(body);
        payload
    }

    fn tag(version: u8, flags: u8, frames: &[Vec<u8>], padding: usize) -> Vec<u8> {
        let body: Vec<u8> = frames.concat();
        let size = (body.len() + padding) as u32;
        let mut data = b"ID3".to_vec();
        data.extend([version, 0, flags]);
        data.extend(syncsafe_bytes(size));
        data.extend(body);
        data.extend(vec![0u8; padding]);
        data
    }

    fn utf16le_bom(s: &str) -> Vec<u8> {
        let mut out = vec![0xFF, 0xFE];
        for unit in s.encode_utf16() {
            out.extend(unit.to_le_bytes());
        }
        out
    }

    fn utf16be(s: &str, bom: bool) -> Vec<u8> {
        let mut out = if bom { vec![0xFE, 0xFF] } else { vec![] };
        for unit in s.encode_utf16() {
            out.extend(unit.to_be_bytes());
        }
        out
    }

    fn texts(frames: &[ExtendedFrame]) -> Vec<(&str, &str)> {
        frames.iter().map(|f| (f.id.as_str(), f.text.as_str())).collect()
    }

    #[test]
    fn test_syncsafe() {
        assert_eq!(syncsafe(&[0, 0, 0x02, 0x01]), Some(257));
        assert_eq!(syncsafe(&[0x7F, 0x7F, 0x7F, 0x7F]), Some(0x0FFF_FFFF));
        assert_eq!(syncsafe(&[0, 0, 0x80, 0]), None);
    }

    #[test]
    fn test_v23_latin1_frames() {
        let data = tag(
            3,
            0,
            &[
                frame(3, "TPE1", &text(0, b"Radiohead")),
                frame(3, "TIT2", &text(0, b"Creep\0")),
            ],
            64,
        );
        let frames = parse_extended(&data);
        assert_eq!(texts(&frames), vec![("TPE1", "Radiohead"), ("TIT2", "Creep")]);
        assert_eq!(frames[0].encoding, TextEncoding::Latin1);
    }

    #[test]
    fn test_latin1_maps_bytes_to_code_points() {
        let data = tag(3, 0, &[frame(3, "TPE1", &text(0, b"Bj\xF6rk"))], 0);
        assert_eq!(parse_extended(&data)[0].text, "Björk");
    }

    #[test]
    fn test_utf16_with_either_bom() {
        let data = tag(
            3,
            0,
            &[
                frame(3, "TPE1", &text(1, &utf16le_bom("Sigur Rós"))),
                frame(3, "TIT2", &text(1, &utf16be("Hoppípolla", true))),
            ],
            0,
        );
        let frames = parse_extended(&data);
        assert_eq!(texts(&frames), vec![("TPE1", "Sigur Rós"), ("TIT2", "Hoppípolla")]);
        assert!(frames.iter().all(|f| f.encoding == TextEncoding::Utf16));
    }

    #[test]
    fn test_v24_utf16be_and_utf8() {
        let data = tag(
            4,
            0,
            &[
                frame(4, "TPE1", &text(2, &utf16be("Björk", false))),
                frame(4, "TIT2", &text(3, "Jóga".as_bytes())),
            ],
            10,
        );
        let frames = parse_extended(&data);
        assert_eq!(texts(&frames), vec![("TPE1", "Björk"), ("TIT2", "Jóga")]);
        assert_eq!(frames[0].encoding, TextEncoding::Utf16Be);
        assert_eq!(frames[1].encoding, TextEncoding::Utf8);
    }

    #[test]
    fn test_only_first_value_of_multi_value_text() {
        let mut body = utf16le_bom("Artist A");
        body.extend([0, 0]);
        body.extend(utf16le_bom("Artist B"));
        let data = tag(3, 0, &[frame(3, "TPE1", &text(1, &body))], 0);
        assert_eq!(parse_extended(&data)[0].text, "Artist A");
    }

    #[test]
    fn test_unwanted_frames_are_skipped() {
        let data = tag(
            3,
            0,
            &[
                frame(3, "TALB", &text(0, b"OK Computer")),
                frame(3, "APIC", &[0xFF; 300]),
                frame(3, "TIT2", &text(0, b"Airbag")),
            ],
            0,
        );
        assert_eq!(texts(&parse_extended(&data)), vec![("TIT2", "Airbag")]);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let data = tag(
            3,
            0,
            &[
                frame(3, "TIT2", &text(0, b"First")),
                frame(3, "TIT2", &text(0, b"Second")),
            ],
            0,
        );
        assert_eq!(texts(&parse_extended(&data)), vec![("TIT2", "First")]);
    }

    #[test]
    fn test_oversized_frame_discards_tag() {
        let mut bad = frame(3, "TALB", &text(0, b"x"));
        bad[4..8].copy_from_slice(&1000u32.to_be_bytes());
        let data = tag(3, 0, &[frame(3, "TPE1", &text(0, b"Kept?")), bad], 0);

        assert!(parse_extended(&data).is_empty());

        let header = TagHeader::parse(&data).unwrap();
        let err = parse_frames(&header, &data[HEADER_SIZE..]).unwrap_err();
        assert!(matches!(err, TagError::MalformedFrame { ref id, size: 1000, .. } if id == "TALB"));
    }

    #[test]
    fn test_garbage_frame_id_discards_tag() {
        let mut body = frame(3, "TPE1", &text(0, b"A"));
        body.extend(b"\x01\x02\x03\x04\0\0\0\x01\0\0x");
        let data = tag(3, 0, &[body], 0);
        assert!(parse_extended(&data).is_empty());
    }

    #[test]
    fn test_v24_size_with_high_bit_discards_tag() {
        let mut bad = frame(4, "TIT2", &text(3, b"x"));
        bad[6] = 0x80;
        let data = tag(4, 0, &[frame(4, "TPE1", &text(3, b"Kept?")), bad], 0);

        assert!(parse_extended(&data).is_empty());

        let header = TagHeader::parse(&data).unwrap();
        let err = parse_frames(&header, &data[HEADER_SIZE..]).unwrap_err();
        assert!(matches!(err, TagError::InvalidFrameSize { ref id, .. } if id == "TIT2"));
        assert!(err.to_string().contains("TIT2"));
    }

    #[test]
    fn test_extended_header_is_skipped() {
        let mut ext = 6u32.to_be_bytes().to_vec();
        ext.extend([0u8; 6]);
        let data = tag(
            3,
            FLAG_EXTENDED_HEADER,
            &[ext, frame(3, "TIT2", &text(0, b"Behind"))],
            0,
        );
        assert_eq!(texts(&parse_extended(&data)), vec![("TIT2", "Behind")]);

        let mut ext4 = syncsafe_bytes(6).to_vec();
        ext4.extend([1, 0]);
        let data = tag(
            4,
            FLAG_EXTENDED_HEADER,
            &[ext4, frame(4, "TIT2", &text(3, b"Front"))],
            0,
        );
        assert_eq!(texts(&parse_extended(&data)), vec![("TIT2", "Front")]);
    }

    #[test]
    fn test_v24_data_length_indicator() {
        let mut payload = syncsafe_bytes(5).to_vec();
        payload.extend(text(3, b"Wire"));
        let mut data_frame = frame(4, "TIT2", &payload);
        data_frame[9] = V4_FRAME_DATA_LENGTH;
        let data = tag(4, 0, &[data_frame], 0);
        assert_eq!(parse_extended(&data)[0].text, "Wire");
    }

    #[test]
    fn test_compressed_frame_is_ignored() {
        let mut compressed = frame(3, "TIT2", &text(0, b"zzzz"));
        compressed[9] = V3_FRAME_COMPRESSED;
        let data = tag(3, 0, &[compressed, frame(3, "TPE1", &text(0, b"Plain"))], 0);
        assert_eq!(texts(&parse_extended(&data)), vec![("TPE1", "Plain")]);
    }

    #[test]
    fn test_remove_unsynchronisation() {
        assert_eq!(remove_unsynchronisation(&[0xFF, 0x00, 0xE0]), vec![0xFF, 0xE0]);
        assert_eq!(remove_unsynchronisation(&[0x00, 0xFF, 0x01]), vec![0x00, 0xFF, 0x01]);
        assert_eq!(remove_unsynchronisation(&[0xFF, 0x00, 0x00]), vec![0xFF, 0x00]);
    }

    #[test]
    fn test_missing_or_unsupported_tag() {
        assert!(parse_extended(b"").is_empty());
        assert!(parse_extended(b"\xFF\xFB\x90\x00 audio").is_empty());

        let mut v22 = tag(3, 0, &[frame(3, "TIT2", &text(0, b"Old"))], 0);
        v22[3] = 2;
        assert!(parse_extended(&v22).is_empty());
    }

    #[test]
    fn test_read_from_file_start() {
        let mut data = tag(4, 0, &[frame(4, "TPE1", &text(3, b"Portishead"))], 32);
        data.extend(vec![0xFFu8; 1024]);

        let frames = read_extended(&mut Cursor::new(data)).unwrap();
        assert_eq!(texts(&frames), vec![("TPE1", "Portishead")]);
    }

    #[test]
    fn test_read_short_and_truncated_input() {
        assert!(read_extended(&mut Cursor::new(b"ID3".to_vec())).unwrap().is_empty());

        // Header promises more than the file holds; surviving frames still parse.
        let mut data = tag(3, 0, &[frame(3, "TIT2", &text(0, b"Cut"))], 0);
        let size = syncsafe_bytes(5000);
        data[6..10].copy_from_slice(&size);
        let frames = read_extended(&mut Cursor::new(data)).unwrap();
        assert_eq!(texts(&frames), vec![("TIT2", "Cut")]);
    }

    #[test]
    fn test_huge_declared_size_on_tiny_input() {
        let mut data = tag(3, 0, &[frame(3, "TPE1", &text(0, b"Tiny"))], 0);
        data[6..10].copy_from_slice(&syncsafe_bytes(0x0FFF_FFFF));
        assert!(data.len() < 64);

        let frames = read_extended(&mut Cursor::new(data)).unwrap();
        assert_eq!(texts(&frames), vec![("TPE1", "Tiny")]);
    }
}

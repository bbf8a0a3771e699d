//! JPEG comment (COM) segment codec.
//!
//! The attestation is stored as a COM segment whose body is `<tag>:<text>`.
//! Injection rewrites only the marker segments before the scan, so the
//! entropy-coded image data and therefore the decoded pixels are untouched.

use crate::error::{Result, TesseraError};

const MARKER_PREFIX: u8 = 0xFF;
const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const COM: u8 = 0xFE;

/// Largest segment body that fits the 16-bit length field.
const MAX_SEGMENT_BODY: usize = u16::MAX as usize - 2;

struct Segment {
    marker: u8,
    /// Offset of the 0xFF that starts the segment.
    start: usize,
    /// Offset one past the segment end.
    end: usize,
    body: std::ops::Range<usize>,
}

/// Walk the header segments, stopping at SOS/EOI or at the first
/// malformed segment.
fn header_segments(data: &[u8]) -> Option<Vec<Segment>> {
    if data.len() < 2 || data[0] != MARKER_PREFIX || data[1] != SOI {
        return None;
    }

    let mut segments = Vec::new();
    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != MARKER_PREFIX {
            break;
        }
        let start = pos;
        // Skip fill bytes.
        while pos < data.len() && data[pos] == MARKER_PREFIX {
            pos += 1;
        }
        let Some(&marker) = data.get(pos) else {
            break;
        };
        pos += 1;

        if marker == SOS || marker == EOI {
            break;
        }
        // Standalone markers carry no length.
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            continue;
        }
        if pos + 2 > data.len() {
            break;
        }
        let len = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
        if len < 2 || pos + len > data.len() {
            break;
        }
        segments.push(Segment {
            marker,
            start,
            end: pos + len,
            body: pos + 2..pos + len,
        });
        pos += len;
    }
    Some(segments)
}

fn tagged_body<'a>(body: &'a [u8], tag: &str) -> Option<&'a [u8]> {
    body.strip_prefix(tag.as_bytes())?.strip_prefix(b":")
}

/// Write `text` under `tag`, replacing any previous comment with that tag.
pub fn write_ancillary_text(data: &[u8], tag: &str, text: &str) -> Result<Vec<u8>> {
    let segments = header_segments(data)
        .ok_or_else(|| TesseraError::ImageRead("Not a JPEG stream".into()))?;

    let body_len = tag.len() + 1 + text.len();
    if body_len > MAX_SEGMENT_BODY {
        return Err(TesseraError::Serialization(format!(
            "Metadata of {body_len} bytes exceeds JPEG comment limit"
        )));
    }

    // Insert after the leading APPn run so JFIF/EXIF stay first.
    let insert_at = segments
        .iter()
        .take_while(|s| (0xE0..=0xEF).contains(&s.marker))
        .last()
        .map_or(2, |s| s.end);

    let mut out = Vec::with_capacity(data.len() + body_len + 4);
    let mut cursor = 0;
    let mut inserted = false;

    for segment in &segments {
        if !inserted && segment.start >= insert_at {
            out.extend_from_slice(&data[cursor..insert_at]);
            push_comment(&mut out, tag, text);
            cursor = insert_at;
            inserted = true;
        }
        let stale =
            segment.marker == COM && tagged_body(&data[segment.body.clone()], tag).is_some();
        if stale {
            out.extend_from_slice(&data[cursor..segment.start]);
            cursor = segment.end;
        }
    }
    if !inserted {
        out.extend_from_slice(&data[cursor..insert_at]);
        push_comment(&mut out, tag, text);
        cursor = insert_at;
    }
    out.extend_from_slice(&data[cursor..]);
    Ok(out)
}

fn push_comment(out: &mut Vec<u8>, tag: &str, text: &str) {
    let len = (tag.len() + 1 + text.len() + 2) as u16;
    out.extend_from_slice(&[MARKER_PREFIX, COM]);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(tag.as_bytes());
    out.push(b':');
    out.extend_from_slice(text.as_bytes());
}

/// Read the text stored under `tag`, if any.
///
/// Returns `None` for non-JPEG data, a missing comment or a body that is not
/// UTF-8.
pub fn read_ancillary_text(data: &[u8], tag: &str) -> Option<String> {
    header_segments(data)?
        .iter()
        .filter(|s| s.marker == COM)
        .find_map(|s| tagged_body(&data[s.body.clone()], tag))
        .and_then(|body| String::from_utf8(body.to_vec()).ok())
}

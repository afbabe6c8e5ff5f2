use std::ops::Range;

use crate::foundation::error::{MadamError, MadamResult};

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const APP13: u8 = 0xED;

/// Identifier that opens an Exif APP1 payload.
const EXIF_HEADER: &[u8] = b"Exif\0\0";
/// Identifier that opens a Photoshop APP13 payload.
const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";
/// Largest payload an APP segment can carry (length field includes its own two bytes).
const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;

/// Marker segment in the header portion of a JPEG stream, before the first scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Segment {
    pub(crate) marker: u8,
    /// Whole segment, including the `0xFF marker` prefix and the length field.
    pub(crate) span: Range<usize>,
    pub(crate) payload: Range<usize>,
}

pub(crate) fn is_jpeg(data: &[u8]) -> bool {
    data.len() >= 3 && data[0] == 0xFF && data[1] == SOI && data[2] == 0xFF
}

/// Walk the marker segments that precede the entropy-coded data.
pub(crate) fn segments(data: &[u8]) -> MadamResult<Vec<Segment>> {
    if !is_jpeg(data) {
        return Err(MadamError::unsupported("not a JPEG stream"));
    }
    let mut out = Vec::new();
    let mut pos = 2;
    loop {
        let start = pos;
        if data.get(pos) != Some(&0xFF) {
            return Err(malformed(pos, "expected marker"));
        }
        // Markers may be preceded by any number of 0xFF fill bytes.
        while data.get(pos) == Some(&0xFF) {
            pos += 1;
        }
        let marker = *data.get(pos).ok_or_else(|| malformed(pos, "truncated marker"))?;
        pos += 1;
        if marker == SOS || marker == EOI {
            return Ok(out);
        }
        if (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            continue;
        }
        let len = data
            .get(pos..pos + 2)
            .map(|b| usize::from(u16::from_be_bytes([b[0], b[1]])))
            .ok_or_else(|| malformed(pos, "truncated segment length"))?;
        if len < 2 || pos + len > data.len() {
            return Err(malformed(pos, "segment length out of bounds"));
        }
        out.push(Segment {
            marker,
            span: start..pos + len,
            payload: pos + 2..pos + len,
        });
        pos += len;
    }
}

fn malformed(offset: usize, what: &str) -> MadamError {
    MadamError::unsupported(format!("malformed JPEG at byte {offset}: {what}"))
}

fn tagged(data: &[u8], segment: &Segment, marker: u8, header: &[u8]) -> bool {
    segment.marker == marker && data[segment.payload.clone()].starts_with(header)
}

/// TIFF structure of the first Exif APP1 segment, if any.
pub(crate) fn exif_payload(data: &[u8]) -> MadamResult<Option<&[u8]>> {
    Ok(segments(data)?
        .into_iter()
        .find(|s| tagged(data, s, APP1, EXIF_HEADER))
        .map(|s| &data[s.payload.start + EXIF_HEADER.len()..s.payload.end]))
}

/// Copy of `data` without Exif APP1 segments.
pub(crate) fn strip_exif(data: &[u8]) -> MadamResult<Vec<u8>> {
    strip_tagged(data, APP1, EXIF_HEADER)
}

/// Replace any Exif APP1 segment with one holding `tiff`, placed after SOI or a leading APP0.
pub(crate) fn insert_exif(data: &[u8], tiff: &[u8]) -> MadamResult<Vec<u8>> {
    replace_tagged(data, APP1, EXIF_HEADER, tiff, "Exif")
}

/// Photoshop image resource blocks of all APP13 segments, concatenated in stream order.
///
/// Writers split large resource blocks over consecutive segments.
pub(crate) fn photoshop_resources(data: &[u8]) -> MadamResult<Option<Vec<u8>>> {
    let mut found = None;
    for segment in segments(data)? {
        if tagged(data, &segment, APP13, PHOTOSHOP_HEADER) {
            let body = segment.payload.start + PHOTOSHOP_HEADER.len()..segment.payload.end;
            found
                .get_or_insert_with(Vec::new)
                .extend_from_slice(&data[body]);
        }
    }
    Ok(found)
}

/// Copy of `data` without Photoshop APP13 segments.
pub(crate) fn strip_photoshop(data: &[u8]) -> MadamResult<Vec<u8>> {
    strip_tagged(data, APP13, PHOTOSHOP_HEADER)
}

/// Replace the Photoshop APP13 segments with a single one holding `resources`.
pub(crate) fn insert_photoshop(data: &[u8], resources: &[u8]) -> MadamResult<Vec<u8>> {
    replace_tagged(data, APP13, PHOTOSHOP_HEADER, resources, "Photoshop resource")
}

fn strip_tagged(data: &[u8], marker: u8, header: &[u8]) -> MadamResult<Vec<u8>> {
    let spans: Vec<Range<usize>> = segments(data)?
        .into_iter()
        .filter(|s| tagged(data, s, marker, header))
        .map(|s| s.span)
        .collect();
    let mut out = Vec::with_capacity(data.len());
    let mut cursor = 0;
    for span in spans {
        out.extend_from_slice(&data[cursor..span.start]);
        cursor = span.end;
    }
    out.extend_from_slice(&data[cursor..]);
    Ok(out)
}

/// Swap the segments identified by `marker` and `header` for one carrying `body`.
///
/// The new segment follows the leading APPn segments that sort before `marker`.
fn replace_tagged(
    data: &[u8],
    marker: u8,
    header: &[u8],
    body: &[u8],
    what: &str,
) -> MadamResult<Vec<u8>> {
    let payload_len = header.len() + body.len();
    if payload_len > MAX_SEGMENT_PAYLOAD {
        return Err(MadamError::unsupported(format!(
            "{what} block of {payload_len} bytes does not fit a JPEG segment"
        )));
    }
    let stripped = strip_tagged(data, marker, header)?;
    let insert_at = segments(&stripped)?
        .iter()
        .take_while(|s| (APP0..marker).contains(&s.marker))
        .last()
        .map_or(2, |s| s.span.end);

    let mut out = Vec::with_capacity(stripped.len() + payload_len + 4);
    out.extend_from_slice(&stripped[..insert_at]);
    out.extend_from_slice(&[0xFF, marker]);
    out.extend_from_slice(&((payload_len + 2) as u16).to_be_bytes());
    out.extend_from_slice(header);
    out.extend_from_slice(body);
    out.extend_from_slice(&stripped[insert_at..]);
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/codecs/jpeg.rs"]
mod tests;

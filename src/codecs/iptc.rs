use std::io::Read;
use std::ops::Range;

use anyhow::Context as _;
use chrono::{NaiveDate, NaiveTime};
use tracing::debug;

use crate::asset::{Metadata, MetadataValue, Namespaces};
use crate::codecs::jpeg;
use crate::foundation::error::{MadamError, MadamResult};
use crate::registry::{MetadataProcessor, ReadSeek};

/// Namespace owned by [`IptcMetadataProcessor`].
pub const IPTC_NAMESPACE: &str = "iptc";

/// Photoshop image resource holding the IPTC-NAA record.
const IPTC_RESOURCE: u16 = 0x0404;
const RESOURCE_SIGNATURE: &[u8] = b"8BIM";
/// Tag byte that opens every IIM dataset.
const TAG_MARKER: u8 = 0x1C;
const ENVELOPE: u8 = 1;
const APPLICATION: u8 = 2;
const CODED_CHARACTER_SET: u8 = 90;
const RECORD_VERSION: u8 = 0;
/// ISO 2022 escape sequence announcing UTF-8 text.
const UTF8_ESCAPE: &[u8] = b"\x1b%G";
const IIM_DATE: &str = "%Y%m%d";
const ISO_DATE: &str = "%Y-%m-%d";
const IIM_TIME: &str = "%H%M%S";
const TIME: &str = "%H:%M:%S";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Text,
    /// Repeatable dataset, surfaced as a list of texts.
    List,
    Date,
    Time,
}

/// Metadata key, application record dataset number and value representation.
const KEYS: &[(&str, u8, Kind)] = &[
    ("byline_titles", 85, Kind::List),
    ("bylines", 80, Kind::List),
    ("caption", 120, Kind::Text),
    ("city", 90, Kind::Text),
    ("contacts", 118, Kind::List),
    ("copyright", 116, Kind::Text),
    ("country", 101, Kind::Text),
    ("creation_date", 55, Kind::Date),
    ("creation_time", 60, Kind::Time),
    ("credit", 110, Kind::Text),
    ("expiration_date", 37, Kind::Date),
    ("expiration_time", 38, Kind::Time),
    ("headline", 105, Kind::Text),
    ("image_orientation", 131, Kind::Text),
    ("keywords", 25, Kind::List),
    ("language", 135, Kind::Text),
    ("release_date", 30, Kind::Date),
    ("release_time", 35, Kind::Time),
    ("source", 115, Kind::Text),
    ("subjects", 12, Kind::List),
    ("title", 5, Kind::Text),
];

/// One IIM dataset: record number, dataset number and raw value.
#[derive(Clone, Debug, PartialEq, Eq)]
struct DataSet {
    record: u8,
    number: u8,
    value: Vec<u8>,
}

/// Photoshop image resource inside an APP13 block.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Resource {
    id: u16,
    signature: [u8; 4],
    /// Whole resource including padding.
    span: Range<usize>,
    data: Range<usize>,
}

/// IPTC-IIM metadata in JPEG essences.
///
/// The application record lives in the IPTC-NAA resource of the Photoshop APP13 segment. A fixed
/// set of datasets maps to domain keys (`headline`, `keywords`, `creation_date`, ...). Other
/// datasets and other Photoshop resources are preserved on `combine`.
#[derive(Clone, Copy, Debug, Default)]
pub struct IptcMetadataProcessor;

impl IptcMetadataProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataProcessor for IptcMetadataProcessor {
    fn name(&self) -> &'static str {
        "iptc"
    }

    fn formats(&self) -> &'static [&'static str] {
        &[IPTC_NAMESPACE]
    }

    fn read(&self, stream: &mut dyn ReadSeek) -> MadamResult<Namespaces> {
        let data = read_all(stream)?;
        let Some(irb) = jpeg::photoshop_resources(&data)? else {
            return Ok(Namespaces::new());
        };
        let Some(iptc) = resources(&irb)?.into_iter().find(is_iptc) else {
            return Ok(Namespaces::new());
        };
        let datasets = parse_datasets(&irb[iptc.data])?;

        let mut entries = Metadata::new();
        for &(key, number, kind) in KEYS {
            let values: Vec<&[u8]> = datasets
                .iter()
                .filter(|d| d.record == APPLICATION && d.number == number)
                .map(|d| d.value.as_slice())
                .collect();
            if values.is_empty() {
                continue;
            }
            match decode(&values, kind) {
                Some(value) => {
                    entries.insert(key.to_string(), value);
                }
                None => debug!(key, "undecodable iptc value skipped"),
            }
        }
        Ok(Namespaces::from([(IPTC_NAMESPACE.to_string(), entries)]))
    }

    fn strip(&self, stream: &mut dyn ReadSeek) -> MadamResult<Vec<u8>> {
        let data = read_all(stream)?;
        let irb = jpeg::photoshop_resources(&data)?.unwrap_or_default();
        let kept = without_iptc(&irb, &resources(&irb)?);
        rewrite(&data, kept)
    }

    fn combine(&self, stream: &mut dyn ReadSeek, metadata: &Namespaces) -> MadamResult<Vec<u8>> {
        if let Some(unknown) = metadata.keys().find(|ns| ns.as_str() != IPTC_NAMESPACE) {
            return Err(MadamError::unsupported(format!(
                "metadata format '{unknown}' is not supported by the iptc processor"
            )));
        }
        let data = read_all(stream)?;
        let irb = jpeg::photoshop_resources(&data)?.unwrap_or_default();
        let found = resources(&irb)?;

        let mut datasets: Vec<DataSet> = match found.iter().find(|r| is_iptc(r)) {
            Some(iptc) => parse_datasets(&irb[iptc.data.clone()])?,
            None => Vec::new(),
        };
        // The envelope is rewritten below.
        datasets.retain(|d| {
            !matches!(
                (d.record, d.number),
                (ENVELOPE, CODED_CHARACTER_SET) | (APPLICATION, RECORD_VERSION)
            )
        });
        for (key, value) in metadata.values().flatten() {
            let Some(&(_, number, kind)) = KEYS.iter().find(|(k, _, _)| k == key) else {
                continue;
            };
            let encoded = encode(value, kind).ok_or_else(|| {
                MadamError::unsupported(format!("invalid value for iptc key '{key}': {value:?}"))
            })?;
            datasets.retain(|d| !(d.record == APPLICATION && d.number == number));
            datasets.extend(encoded.into_iter().map(|value| DataSet {
                record: APPLICATION,
                number,
                value,
            }));
        }

        let mut kept = without_iptc(&irb, &found);
        if datasets.iter().any(|d| d.record == APPLICATION) {
            let record = write_datasets(&datasets)?;
            push_resource(&mut kept, IPTC_RESOURCE, &record)?;
        }
        rewrite(&data, kept)
    }
}

fn read_all(stream: &mut dyn ReadSeek) -> MadamResult<Vec<u8>> {
    let mut data = Vec::new();
    stream
        .read_to_end(&mut data)
        .context("read iptc source")?;
    Ok(data)
}

fn malformed(what: &str) -> MadamError {
    MadamError::unsupported(format!("malformed iptc block: {what}"))
}

fn is_iptc(resource: &Resource) -> bool {
    resource.signature.as_slice() == RESOURCE_SIGNATURE && resource.id == IPTC_RESOURCE
}

/// Walk the image resources of a Photoshop block.
fn resources(irb: &[u8]) -> MadamResult<Vec<Resource>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < irb.len() {
        let start = pos;
        let header = irb
            .get(pos..pos + 7)
            .ok_or_else(|| malformed("truncated resource header"))?;
        let signature = [header[0], header[1], header[2], header[3]];
        let id = u16::from_be_bytes([header[4], header[5]]);
        // Pascal string name, padded to an even length.
        let name_len = usize::from(header[6]) + 1;
        pos += 6 + name_len + name_len % 2;
        let size = irb
            .get(pos..pos + 4)
            .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize)
            .ok_or_else(|| malformed("truncated resource size"))?;
        pos += 4;
        if pos + size > irb.len() {
            return Err(malformed("resource size out of bounds"));
        }
        let data = pos..pos + size;
        pos = (pos + size + size % 2).min(irb.len());
        out.push(Resource {
            id,
            signature,
            span: start..pos,
            data,
        });
    }
    Ok(out)
}

/// Resource bytes of `irb` minus the IPTC-NAA record.
fn without_iptc(irb: &[u8], found: &[Resource]) -> Vec<u8> {
    let mut kept = Vec::with_capacity(irb.len());
    for resource in found.iter().filter(|r| !is_iptc(r)) {
        kept.extend_from_slice(&irb[resource.span.clone()]);
        if kept.len() % 2 == 1 {
            kept.push(0);
        }
    }
    kept
}

fn push_resource(irb: &mut Vec<u8>, id: u16, data: &[u8]) -> MadamResult<()> {
    let size = u32::try_from(data.len()).map_err(|_| malformed("resource too large"))?;
    irb.extend_from_slice(RESOURCE_SIGNATURE);
    irb.extend_from_slice(&id.to_be_bytes());
    // Empty name plus its padding byte.
    irb.extend_from_slice(&[0, 0]);
    irb.extend_from_slice(&size.to_be_bytes());
    irb.extend_from_slice(data);
    if data.len() % 2 == 1 {
        irb.push(0);
    }
    Ok(())
}

fn rewrite(data: &[u8], irb: Vec<u8>) -> MadamResult<Vec<u8>> {
    if irb.is_empty() {
        jpeg::strip_photoshop(data)
    } else {
        jpeg::insert_photoshop(data, &irb)
    }
}

fn parse_datasets(block: &[u8]) -> MadamResult<Vec<DataSet>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < block.len() {
        match block[pos] {
            TAG_MARKER => {}
            // Writers pad the record with zeros.
            0 if block[pos..].iter().all(|&b| b == 0) => break,
            other => return Err(malformed(&format!("unexpected byte {other:#04x} at {pos}"))),
        }
        let header = block
            .get(pos + 1..pos + 5)
            .ok_or_else(|| malformed("truncated dataset header"))?;
        let (record, number) = (header[0], header[1]);
        let declared = u16::from_be_bytes([header[2], header[3]]);
        pos += 5;
        let len = if declared & 0x8000 == 0 {
            usize::from(declared)
        } else {
            // Extended dataset: the low bits count the length bytes that follow.
            let count = usize::from(declared & 0x7FFF);
            if count > 4 {
                return Err(malformed("extended length wider than 32 bits"));
            }
            let bytes = block
                .get(pos..pos + count)
                .ok_or_else(|| malformed("truncated extended length"))?;
            pos += count;
            bytes.iter().fold(0usize, |len, &b| (len << 8) | usize::from(b))
        };
        let value = block
            .get(pos..pos + len)
            .ok_or_else(|| malformed("dataset length out of bounds"))?;
        out.push(DataSet {
            record,
            number,
            value: value.to_vec(),
        });
        pos += len;
    }
    Ok(out)
}

/// Serialize `datasets` behind a UTF-8 envelope and record version 4.
fn write_datasets(datasets: &[DataSet]) -> MadamResult<Vec<u8>> {
    let envelope = [
        DataSet {
            record: ENVELOPE,
            number: CODED_CHARACTER_SET,
            value: UTF8_ESCAPE.to_vec(),
        },
        DataSet {
            record: APPLICATION,
            number: RECORD_VERSION,
            value: 4u16.to_be_bytes().to_vec(),
        },
    ];
    let mut ordered: Vec<&DataSet> = envelope.iter().chain(datasets).collect();
    ordered.sort_by_key(|d| (d.record, d.number));

    let mut out = Vec::new();
    for dataset in ordered {
        out.extend_from_slice(&[TAG_MARKER, dataset.record, dataset.number]);
        match u16::try_from(dataset.value.len()) {
            Ok(len) if len < 0x8000 => out.extend_from_slice(&len.to_be_bytes()),
            _ => {
                let len = u32::try_from(dataset.value.len())
                    .map_err(|_| malformed("dataset too large"))?;
                out.extend_from_slice(&0x8004u16.to_be_bytes());
                out.extend_from_slice(&len.to_be_bytes());
            }
        }
        out.extend_from_slice(&dataset.value);
    }
    Ok(out)
}

/// Text of a dataset; records without a UTF-8 envelope are commonly Latin-1.
fn text(value: &[u8]) -> String {
    match std::str::from_utf8(value) {
        Ok(s) => s.to_string(),
        Err(_) => value.iter().map(|&b| char::from(b)).collect(),
    }
}

fn decode(values: &[&[u8]], kind: Kind) -> Option<MetadataValue> {
    let first = text(values.first()?);
    match kind {
        Kind::Text => Some(MetadataValue::Text(first)),
        Kind::List => Some(MetadataValue::List(
            values.iter().map(|v| MetadataValue::Text(text(v))).collect(),
        )),
        Kind::Date => {
            let date = NaiveDate::parse_from_str(&first, IIM_DATE).ok()?;
            Some(MetadataValue::Text(date.format(ISO_DATE).to_string()))
        }
        Kind::Time => {
            // HHMMSS followed by a UTC offset.
            let time = NaiveTime::parse_from_str(first.get(..6)?, IIM_TIME).ok()?;
            Some(MetadataValue::Text(time.format(TIME).to_string()))
        }
    }
}

fn encode(value: &MetadataValue, kind: Kind) -> Option<Vec<Vec<u8>>> {
    match kind {
        Kind::Text => Some(vec![value.as_str()?.as_bytes().to_vec()]),
        Kind::List => match value {
            MetadataValue::Text(s) => Some(vec![s.as_bytes().to_vec()]),
            MetadataValue::List(items) => items
                .iter()
                .map(|v| v.as_str().map(|s| s.as_bytes().to_vec()))
                .collect(),
            MetadataValue::Tags(tags) => Some(tags.iter().map(|t| t.as_bytes().to_vec()).collect()),
            _ => None,
        },
        Kind::Date => {
            let date = NaiveDate::parse_from_str(value.as_str()?, ISO_DATE).ok()?;
            Some(vec![date.format(IIM_DATE).to_string().into_bytes()])
        }
        Kind::Time => {
            let time = NaiveTime::parse_from_str(value.as_str()?, TIME).ok()?;
            Some(vec![format!("{}+0000", time.format(IIM_TIME)).into_bytes()])
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/codecs/iptc.rs"]
mod tests;

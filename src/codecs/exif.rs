use std::io::{Cursor, Read};

use anyhow::Context as _;
use chrono::{NaiveDate, NaiveTime, Timelike};
use exif::experimental::Writer;
use exif::{Context, Field, In, Rational, SRational, Tag, Value};
use tracing::debug;

use crate::asset::{Metadata, MetadataValue, Namespaces};
use crate::codecs::jpeg;
use crate::foundation::error::{MadamError, MadamResult};
use crate::registry::{MetadataProcessor, ReadSeek};

/// Namespace owned by [`ExifMetadataProcessor`].
pub const EXIF_NAMESPACE: &str = "exif";

const EXIF_DATE: &str = "%Y:%m:%d";
const ISO_DATE: &str = "%Y-%m-%d";
const TIME: &str = "%H:%M:%S";
/// Largest denominator used when turning floats into Exif rationals.
const MAX_DENOMINATOR: u64 = 1_000_000;

/// Wire representation of one mapped Exif tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Text,
    Int,
    Rational,
    SRational,
    /// Degrees, minutes, seconds.
    RationalTriple,
    /// `BYTE` code translated through a vocabulary.
    ByteCode(&'static [(u8, &'static str)]),
    /// Single-letter `ASCII` code translated through a vocabulary.
    AsciiCode(&'static [(&'static str, &'static str)]),
    Date,
    Time,
}

const ALTITUDE_REF: &[(u8, &str)] = &[(0, "m_above_sea_level"), (1, "m_below_sea_level")];
const LATITUDE_REF: &[(&str, &str)] = &[("N", "north"), ("S", "south")];
const LONGITUDE_REF: &[(&str, &str)] = &[("E", "east"), ("W", "west")];
const SPEED_REF: &[(&str, &str)] = &[("K", "km/h"), ("M", "mph"), ("N", "kn")];

/// Metadata key, Exif tag and value representation.
const KEYS: &[(&str, Tag, Kind)] = &[
    ("aperture", Tag::ApertureValue, Kind::Rational),
    ("artist", Tag::Artist, Kind::Text),
    ("brightness", Tag::BrightnessValue, Kind::SRational),
    ("camera.manufacturer", Tag::Make, Kind::Text),
    ("camera.model", Tag::Model, Kind::Text),
    ("description", Tag::ImageDescription, Kind::Text),
    ("exposure_time", Tag::ExposureTime, Kind::Rational),
    ("firmware", Tag::Software, Kind::Text),
    ("fnumber", Tag::FNumber, Kind::Rational),
    ("focal_length", Tag::FocalLength, Kind::Rational),
    ("focal_length_35mm", Tag::FocalLengthIn35mmFilm, Kind::Int),
    ("gps.altitude", Tag::GPSAltitude, Kind::Rational),
    ("gps.altitude_ref", Tag::GPSAltitudeRef, Kind::ByteCode(ALTITUDE_REF)),
    ("gps.latitude", Tag::GPSLatitude, Kind::RationalTriple),
    ("gps.latitude_ref", Tag::GPSLatitudeRef, Kind::AsciiCode(LATITUDE_REF)),
    ("gps.longitude", Tag::GPSLongitude, Kind::RationalTriple),
    ("gps.longitude_ref", Tag::GPSLongitudeRef, Kind::AsciiCode(LONGITUDE_REF)),
    ("gps.map_datum", Tag::GPSMapDatum, Kind::Text),
    ("gps.speed", Tag::GPSSpeed, Kind::Rational),
    ("gps.speed_ref", Tag::GPSSpeedRef, Kind::AsciiCode(SPEED_REF)),
    ("gps.date_stamp", Tag::GPSDateStamp, Kind::Date),
    ("gps.time_stamp", Tag::GPSTimeStamp, Kind::Time),
    ("lens.manufacturer", Tag::LensMake, Kind::Text),
    ("lens.model", Tag::LensModel, Kind::Text),
    ("orientation", Tag::Orientation, Kind::Int),
    ("shutter_speed", Tag::ShutterSpeedValue, Kind::SRational),
    // ProcessingSoftware has no named constant in kamadak-exif.
    ("software", Tag(Context::Tiff, 0x000b), Kind::Text),
];

/// Exif metadata in JPEG essences.
///
/// Maps a fixed set of Exif tags to and from domain keys (`camera.model`, `gps.latitude`, ...).
/// Tags outside that set are preserved on `combine` but never surfaced.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExifMetadataProcessor;

impl ExifMetadataProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataProcessor for ExifMetadataProcessor {
    fn name(&self) -> &'static str {
        "exif"
    }

    fn formats(&self) -> &'static [&'static str] {
        &[EXIF_NAMESPACE]
    }

    fn read(&self, stream: &mut dyn ReadSeek) -> MadamResult<Namespaces> {
        let data = read_all(stream)?;
        let Some(tiff) = jpeg::exif_payload(&data)? else {
            return Ok(Namespaces::new());
        };
        let parsed = parse_tiff(tiff)?;

        let mut entries = Metadata::new();
        for &(key, tag, kind) in KEYS {
            let Some(field) = parsed.get_field(tag, In::PRIMARY) else {
                continue;
            };
            match decode(&field.value, kind) {
                Some(value) => {
                    entries.insert(key.to_string(), value);
                }
                None => debug!(key, value = ?field.value, "undecodable exif value skipped"),
            }
        }
        Ok(Namespaces::from([(EXIF_NAMESPACE.to_string(), entries)]))
    }

    fn strip(&self, stream: &mut dyn ReadSeek) -> MadamResult<Vec<u8>> {
        jpeg::strip_exif(&read_all(stream)?)
    }

    fn combine(&self, stream: &mut dyn ReadSeek, metadata: &Namespaces) -> MadamResult<Vec<u8>> {
        if let Some(unknown) = metadata.keys().find(|ns| ns.as_str() != EXIF_NAMESPACE) {
            return Err(MadamError::unsupported(format!(
                "metadata format '{unknown}' is not supported by the exif processor"
            )));
        }
        let data = read_all(stream)?;

        let mut fields: Vec<Field> = match jpeg::exif_payload(&data)? {
            Some(tiff) => parse_tiff(tiff)?
                .fields()
                .filter(|f| f.ifd_num == In::PRIMARY)
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        for (key, value) in metadata.values().flatten() {
            let Some(&(_, tag, kind)) = KEYS.iter().find(|(k, _, _)| k == key) else {
                continue;
            };
            let value = encode(value, kind).ok_or_else(|| {
                MadamError::unsupported(format!("invalid value for exif key '{key}': {value:?}"))
            })?;
            fields.retain(|f| f.tag != tag);
            fields.push(Field {
                tag,
                ifd_num: In::PRIMARY,
                value,
            });
        }

        if fields.is_empty() {
            return jpeg::strip_exif(&data);
        }
        let mut writer = Writer::new();
        for field in &fields {
            writer.push_field(field);
        }
        let mut tiff = Cursor::new(Vec::new());
        writer
            .write(&mut tiff, false)
            .map_err(|e| MadamError::unsupported(format!("could not encode exif: {e}")))?;
        jpeg::insert_exif(&data, tiff.get_ref())
    }
}

fn read_all(stream: &mut dyn ReadSeek) -> MadamResult<Vec<u8>> {
    let mut data = Vec::new();
    stream
        .read_to_end(&mut data)
        .context("read exif source")?;
    Ok(data)
}

fn parse_tiff(tiff: &[u8]) -> MadamResult<exif::Exif> {
    exif::Reader::new()
        .read_raw(tiff.to_vec())
        .map_err(|e| MadamError::unsupported(format!("malformed exif block: {e}")))
}

fn ascii(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => parts.first().map(|bytes| {
            String::from_utf8_lossy(bytes)
                .trim_end_matches('\0')
                .to_string()
        }),
        _ => None,
    }
}

fn rationals(value: &Value) -> Option<Vec<f64>> {
    match value {
        Value::Rational(v) => Some(v.iter().map(Rational::to_f64).collect()),
        Value::SRational(v) => Some(v.iter().map(SRational::to_f64).collect()),
        _ => None,
    }
}

fn decode(value: &Value, kind: Kind) -> Option<MetadataValue> {
    match kind {
        Kind::Text => ascii(value).map(MetadataValue::Text),
        Kind::Int => value.get_uint(0).map(MetadataValue::from),
        Kind::Rational | Kind::SRational => {
            rationals(value)?.first().copied().map(MetadataValue::Float)
        }
        Kind::RationalTriple => {
            let parts = rationals(value)?;
            (parts.len() == 3).then(|| {
                MetadataValue::List(parts.into_iter().map(MetadataValue::Float).collect())
            })
        }
        Kind::ByteCode(table) => {
            let code = u8::try_from(value.get_uint(0)?).ok()?;
            lookup(table, &code).map(MetadataValue::from)
        }
        Kind::AsciiCode(table) => {
            let code = ascii(value)?;
            lookup(table, &code.as_str()).map(MetadataValue::from)
        }
        Kind::Date => {
            let date = NaiveDate::parse_from_str(&ascii(value)?, EXIF_DATE).ok()?;
            Some(MetadataValue::Text(date.format(ISO_DATE).to_string()))
        }
        Kind::Time => {
            let parts = rationals(value)?;
            let [h, m, s] = parts.as_slice() else {
                return None;
            };
            let time = NaiveTime::from_hms_opt(
                h.round() as u32,
                m.round() as u32,
                s.round() as u32,
            )?;
            Some(MetadataValue::Text(time.format(TIME).to_string()))
        }
    }
}

fn encode(value: &MetadataValue, kind: Kind) -> Option<Value> {
    match kind {
        Kind::Text => Some(Value::Ascii(vec![value.as_str()?.as_bytes().to_vec()])),
        Kind::Int => {
            let v = u16::try_from(value.as_int()?).ok()?;
            Some(Value::Short(vec![v]))
        }
        Kind::Rational => Some(Value::Rational(vec![unsigned_rational(value.as_float()?)?])),
        Kind::SRational => Some(Value::SRational(vec![signed_rational(value.as_float()?)?])),
        Kind::RationalTriple => {
            let parts = value
                .as_list()?
                .iter()
                .map(|v| v.as_float().and_then(unsigned_rational))
                .collect::<Option<Vec<_>>>()?;
            (parts.len() == 3).then_some(Value::Rational(parts))
        }
        Kind::ByteCode(table) => {
            let code = reverse_lookup(table, value.as_str()?)?;
            Some(Value::Byte(vec![code]))
        }
        Kind::AsciiCode(table) => {
            let code = reverse_lookup(table, value.as_str()?)?;
            Some(Value::Ascii(vec![code.as_bytes().to_vec()]))
        }
        Kind::Date => {
            let date = NaiveDate::parse_from_str(value.as_str()?, ISO_DATE).ok()?;
            Some(Value::Ascii(vec![
                date.format(EXIF_DATE).to_string().into_bytes(),
            ]))
        }
        Kind::Time => {
            let time = NaiveTime::parse_from_str(value.as_str()?, TIME).ok()?;
            let whole = |v: u32| Rational { num: v, denom: 1 };
            Some(Value::Rational(vec![
                whole(time.hour()),
                whole(time.minute()),
                whole(time.second()),
            ]))
        }
    }
}

fn lookup<C: PartialEq + Copy>(table: &[(C, &'static str)], code: &C) -> Option<&'static str> {
    table.iter().find(|(c, _)| c == code).map(|&(_, name)| name)
}

fn reverse_lookup<C: Copy>(table: &[(C, &'static str)], name: &str) -> Option<C> {
    table.iter().find(|(_, n)| *n == name).map(|&(c, _)| c)
}

fn unsigned_rational(value: f64) -> Option<Rational> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let (num, denom) = approximate(value)?;
    Some(Rational {
        num: u32::try_from(num).ok()?,
        denom: u32::try_from(denom).ok()?,
    })
}

fn signed_rational(value: f64) -> Option<SRational> {
    if !value.is_finite() {
        return None;
    }
    let (num, denom) = approximate(value.abs())?;
    let num = i32::try_from(num).ok()?;
    Some(SRational {
        num: if value < 0.0 { -num } else { num },
        denom: i32::try_from(denom).ok()?,
    })
}

/// Closest fraction to a non-negative `value` with a denominator of at most [`MAX_DENOMINATOR`].
fn approximate(value: f64) -> Option<(u64, u64)> {
    let (mut p0, mut q0, mut p1, mut q1) = (0u64, 1u64, 1u64, 0u64);
    let mut x = value;
    loop {
        let a = x.floor();
        if a > u32::MAX as f64 {
            return None;
        }
        let a = a as u64;
        let q2 = q0 + a * q1;
        if q2 > MAX_DENOMINATOR {
            break;
        }
        (p0, q0, p1, q1) = (p1, q1, p0 + a * p1, q2);
        let frac = x - x.floor();
        if frac < 1e-9 {
            return Some((p1, q1));
        }
        x = 1.0 / frac;
    }
    // Semiconvergent between the last two convergents.
    let k = (MAX_DENOMINATOR - q0) / q1;
    let bound = (p0 + k * p1, q0 + k * q1);
    let error = |(p, q): (u64, u64)| (p as f64 / q as f64 - value).abs();
    if error(bound) < error((p1, q1)) {
        Some(bound)
    } else {
        Some((p1, q1))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/codecs/exif.rs"]
mod tests;

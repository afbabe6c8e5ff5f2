use std::io::Cursor;

use super::*;

fn jpeg() -> Vec<u8> {
    let img = image::RgbImage::from_fn(8, 8, |x, y| {
        image::Rgb([(x * 30) as u8, (y * 30) as u8, 90])
    });
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
        .unwrap();
    buf
}

fn exif_namespace(entries: &[(&str, MetadataValue)]) -> Namespaces {
    let metadata: Metadata = entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    Namespaces::from([(EXIF_NAMESPACE.to_string(), metadata)])
}

fn read_exif(data: &[u8]) -> Metadata {
    ExifMetadataProcessor
        .read(&mut Cursor::new(data))
        .unwrap()
        .remove(EXIF_NAMESPACE)
        .unwrap_or_default()
}

#[test]
fn jpeg_without_exif_yields_nothing() {
    let namespaces = ExifMetadataProcessor.read(&mut Cursor::new(jpeg())).unwrap();
    assert!(namespaces.is_empty());
}

#[test]
fn non_jpeg_input_is_unsupported() {
    let err = ExifMetadataProcessor
        .read(&mut Cursor::new(b"GIF89a....".to_vec()))
        .unwrap_err();
    assert!(matches!(err, MadamError::UnsupportedFormat(_)));
    assert!(ExifMetadataProcessor.strip(&mut Cursor::new(b"nope".to_vec())).is_err());
}

#[test]
fn combined_values_read_back() {
    let metadata = exif_namespace(&[
        ("artist", "Jane Doe".into()),
        ("camera.model", "X100".into()),
        ("orientation", 6i64.into()),
        ("focal_length_35mm", 35i64.into()),
        ("fnumber", 2.8.into()),
        ("brightness", (-1.5).into()),
        ("gps.altitude_ref", "m_below_sea_level".into()),
        ("gps.latitude_ref", "north".into()),
        ("gps.speed_ref", "kn".into()),
        ("gps.date_stamp", "2020-05-17".into()),
        ("gps.time_stamp", "13:45:07".into()),
        (
            "gps.latitude",
            MetadataValue::List(vec![52.0.into(), 31.0.into(), 12.5.into()]),
        ),
    ]);

    let combined = ExifMetadataProcessor
        .combine(&mut Cursor::new(jpeg()), &metadata)
        .unwrap();
    let exif = read_exif(&combined);

    assert_eq!(exif, metadata[EXIF_NAMESPACE]);
}

#[test]
fn unmapped_keys_are_ignored() {
    let metadata = exif_namespace(&[("artist", "A".into()), ("shoe_size", 44i64.into())]);
    let combined = ExifMetadataProcessor
        .combine(&mut Cursor::new(jpeg()), &metadata)
        .unwrap();
    let exif = read_exif(&combined);
    assert_eq!(exif.len(), 1);
    assert!(exif.contains_key("artist"));
}

#[test]
fn combine_merges_with_existing_exif() {
    let first = ExifMetadataProcessor
        .combine(
            &mut Cursor::new(jpeg()),
            &exif_namespace(&[("artist", "A".into()), ("camera.model", "M1".into())]),
        )
        .unwrap();
    let second = ExifMetadataProcessor
        .combine(
            &mut Cursor::new(first),
            &exif_namespace(&[("camera.model", "M2".into())]),
        )
        .unwrap();

    let exif = read_exif(&second);
    assert_eq!(exif["artist"].as_str(), Some("A"));
    assert_eq!(exif["camera.model"].as_str(), Some("M2"));
}

#[test]
fn strip_removes_exif_and_is_idempotent() {
    let original = jpeg();
    let combined = ExifMetadataProcessor
        .combine(
            &mut Cursor::new(original.clone()),
            &exif_namespace(&[("artist", "A".into())]),
        )
        .unwrap();
    assert_ne!(combined, original);

    let stripped = ExifMetadataProcessor
        .strip(&mut Cursor::new(combined))
        .unwrap();
    assert_eq!(stripped, original);
    let again = ExifMetadataProcessor
        .strip(&mut Cursor::new(stripped.clone()))
        .unwrap();
    assert_eq!(again, stripped);
}

#[test]
fn foreign_namespaces_and_bad_values_are_rejected() {
    let mut foreign = Namespaces::new();
    foreign.insert("ffmetadata".into(), Metadata::new());
    let err = ExifMetadataProcessor
        .combine(&mut Cursor::new(jpeg()), &foreign)
        .unwrap_err();
    assert!(matches!(err, MadamError::UnsupportedFormat(_)));

    let bad = exif_namespace(&[("orientation", "upright".into())]);
    assert!(ExifMetadataProcessor
        .combine(&mut Cursor::new(jpeg()), &bad)
        .is_err());
    let bad_ref = exif_namespace(&[("gps.latitude_ref", "up".into())]);
    assert!(ExifMetadataProcessor
        .combine(&mut Cursor::new(jpeg()), &bad_ref)
        .is_err());
}

#[test]
fn floats_become_small_fractions() {
    assert_eq!(approximate(0.5), Some((1, 2)));
    assert_eq!(approximate(2.8), Some((14, 5)));
    assert_eq!(approximate(1.0 / 3.0), Some((1, 3)));
    assert_eq!(approximate(12.0), Some((12, 1)));
    assert!(unsigned_rational(-1.0).is_none());
    let r = signed_rational(-1.5).unwrap();
    assert_eq!((r.num, r.denom), (-3, 2));
}

use std::io::Cursor;

use super::*;

const RESOLUTION_INFO: u16 = 0x03ED;

fn jpeg() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([30, 90, 150]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
        .unwrap();
    buf
}

fn dataset(record: u8, number: u8, value: &[u8]) -> Vec<u8> {
    let mut out = vec![TAG_MARKER, record, number];
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    out.extend_from_slice(value);
    out
}

/// Latin-1 record with an extended-length caption, next to a resolution resource.
fn tagged_jpeg() -> Vec<u8> {
    let mut record = dataset(APPLICATION, RECORD_VERSION, &[0, 4]);
    record.extend(dataset(APPLICATION, 25, b"harbour"));
    record.extend(dataset(APPLICATION, 25, b"boats"));
    record.extend(dataset(APPLICATION, 90, b"Z\xfcrich"));
    record.extend(dataset(APPLICATION, 60, b"134507+0200"));
    record.extend(dataset(APPLICATION, 200, b"custom"));
    record.extend_from_slice(&[TAG_MARKER, APPLICATION, 120, 0x80, 0x02, 0x00, 0x0E]);
    record.extend_from_slice(b"A long caption");
    record.extend_from_slice(&[0, 0, 0]);

    let mut irb = Vec::new();
    push_resource(&mut irb, RESOLUTION_INFO, b"res").unwrap();
    push_resource(&mut irb, IPTC_RESOURCE, &record).unwrap();
    jpeg::insert_photoshop(&jpeg(), &irb).unwrap()
}

fn iptc_namespace(entries: &[(&str, MetadataValue)]) -> Namespaces {
    let metadata: Metadata = entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    Namespaces::from([(IPTC_NAMESPACE.to_string(), metadata)])
}

fn read_iptc(data: &[u8]) -> Metadata {
    IptcMetadataProcessor
        .read(&mut Cursor::new(data))
        .unwrap()
        .remove(IPTC_NAMESPACE)
        .unwrap_or_default()
}

fn texts(items: &[&str]) -> MetadataValue {
    MetadataValue::List(items.iter().map(|&s| s.into()).collect())
}

#[test]
fn jpeg_without_iptc_yields_nothing() {
    let namespaces = IptcMetadataProcessor.read(&mut Cursor::new(jpeg())).unwrap();
    assert!(namespaces.is_empty());

    let err = IptcMetadataProcessor
        .read(&mut Cursor::new(b"GIF89a....".to_vec()))
        .unwrap_err();
    assert!(matches!(err, MadamError::UnsupportedFormat(_)));
}

#[test]
fn reads_latin1_and_extended_datasets() {
    let iptc = read_iptc(&tagged_jpeg());

    assert_eq!(iptc["keywords"], texts(&["harbour", "boats"]));
    assert_eq!(iptc["city"].as_str(), Some("Zürich"));
    assert_eq!(iptc["creation_time"].as_str(), Some("13:45:07"));
    assert_eq!(iptc["caption"].as_str(), Some("A long caption"));
    assert_eq!(iptc.len(), 4);
}

#[test]
fn combined_values_read_back() {
    let metadata = iptc_namespace(&[
        ("headline", "Storm over the bay".into()),
        ("keywords", texts(&["storm", "bay", "weather"])),
        ("bylines", texts(&["Jane Doe"])),
        ("creation_date", "2021-11-03".into()),
        ("creation_time", "06:30:00".into()),
        ("copyright", "© Example Press".into()),
    ]);

    let combined = IptcMetadataProcessor
        .combine(&mut Cursor::new(jpeg()), &metadata)
        .unwrap();
    assert_eq!(read_iptc(&combined), metadata[IPTC_NAMESPACE]);

    let irb = jpeg::photoshop_resources(&combined).unwrap().unwrap();
    let found = resources(&irb).unwrap();
    let datasets = parse_datasets(&irb[found[0].data.clone()]).unwrap();
    assert_eq!(
        (datasets[0].record, datasets[0].number, datasets[0].value.as_slice()),
        (ENVELOPE, CODED_CHARACTER_SET, UTF8_ESCAPE)
    );
    assert_eq!((datasets[1].record, datasets[1].number), (APPLICATION, RECORD_VERSION));
    let time = datasets.iter().find(|d| d.number == 60).unwrap();
    assert_eq!(time.value, b"063000+0000");
}

#[test]
fn single_text_is_accepted_for_repeatable_keys() {
    let combined = IptcMetadataProcessor
        .combine(
            &mut Cursor::new(jpeg()),
            &iptc_namespace(&[("keywords", "solo".into())]),
        )
        .unwrap();
    assert_eq!(read_iptc(&combined)["keywords"], texts(&["solo"]));
}

#[test]
fn combine_keeps_other_datasets_and_resources() {
    let combined = IptcMetadataProcessor
        .combine(
            &mut Cursor::new(tagged_jpeg()),
            &iptc_namespace(&[("headline", "Harbour".into()), ("keywords", texts(&["quay"]))]),
        )
        .unwrap();

    let iptc = read_iptc(&combined);
    assert_eq!(iptc["headline"].as_str(), Some("Harbour"));
    assert_eq!(iptc["keywords"], texts(&["quay"]));
    assert_eq!(iptc["city"].as_str(), Some("Zürich"));
    assert_eq!(iptc["caption"].as_str(), Some("A long caption"));

    let irb = jpeg::photoshop_resources(&combined).unwrap().unwrap();
    let found = resources(&irb).unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].id, RESOLUTION_INFO);
    assert_eq!(&irb[found[0].data.clone()], b"res");
    let datasets = parse_datasets(&irb[found[1].data.clone()]).unwrap();
    assert!(datasets.contains(&DataSet {
        record: APPLICATION,
        number: 200,
        value: b"custom".to_vec(),
    }));
    let versions = datasets
        .iter()
        .filter(|d| (d.record, d.number) == (APPLICATION, RECORD_VERSION))
        .count();
    assert_eq!(versions, 1);
}

#[test]
fn strip_removes_only_the_iptc_resource() {
    let stripped = IptcMetadataProcessor
        .strip(&mut Cursor::new(tagged_jpeg()))
        .unwrap();
    assert!(read_iptc(&stripped).is_empty());
    let irb = jpeg::photoshop_resources(&stripped).unwrap().unwrap();
    let found = resources(&irb).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, RESOLUTION_INFO);

    let original = jpeg();
    let combined = IptcMetadataProcessor
        .combine(
            &mut Cursor::new(original.clone()),
            &iptc_namespace(&[("headline", "H".into())]),
        )
        .unwrap();
    let stripped = IptcMetadataProcessor
        .strip(&mut Cursor::new(combined))
        .unwrap();
    assert_eq!(stripped, original);
    let again = IptcMetadataProcessor
        .strip(&mut Cursor::new(stripped.clone()))
        .unwrap();
    assert_eq!(again, stripped);
}

#[test]
fn unmapped_keys_leave_the_essence_untouched() {
    let original = jpeg();
    let combined = IptcMetadataProcessor
        .combine(
            &mut Cursor::new(original.clone()),
            &iptc_namespace(&[("shoe_size", 44i64.into())]),
        )
        .unwrap();
    assert_eq!(combined, original);
}

#[test]
fn foreign_namespaces_and_bad_values_are_rejected() {
    let mut foreign = Namespaces::new();
    foreign.insert("exif".into(), Metadata::new());
    let err = IptcMetadataProcessor
        .combine(&mut Cursor::new(jpeg()), &foreign)
        .unwrap_err();
    assert!(matches!(err, MadamError::UnsupportedFormat(_)));

    for bad in [
        iptc_namespace(&[("creation_date", "yesterday".into())]),
        iptc_namespace(&[("creation_time", "25:00:00".into())]),
        iptc_namespace(&[("keywords", 3i64.into())]),
        iptc_namespace(&[("headline", texts(&["a", "b"]))]),
    ] {
        let err = IptcMetadataProcessor
            .combine(&mut Cursor::new(jpeg()), &bad)
            .unwrap_err();
        assert!(matches!(err, MadamError::UnsupportedFormat(_)));
    }
}

#[test]
fn malformed_records_are_reported() {
    assert!(parse_datasets(&[TAG_MARKER, 2, 25, 0x00, 0x09, b'a']).is_err());
    assert!(parse_datasets(&[0x42, 2, 25, 0x00, 0x00]).is_err());
    assert!(parse_datasets(&[TAG_MARKER, 2, 25, 0x80, 0x05]).is_err());
    assert_eq!(parse_datasets(&[0, 0, 0]).unwrap(), Vec::new());

    assert!(resources(b"8BIM\x04\x04").is_err());
    let mut oversized = Vec::new();
    push_resource(&mut oversized, IPTC_RESOURCE, b"ab").unwrap();
    oversized[11] = 0x20;
    assert!(resources(&oversized).is_err());
}

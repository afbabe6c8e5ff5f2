use std::io::Cursor;

use super::*;
use crate::operator::Operator;

const SQUARE: &[u8] = br##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="20" height="10" viewBox="0 0 20 10">
  <rect x="0" y="0" width="10" height="10" fill="#ff0000"/>
</svg>"##;

fn svg() -> Asset {
    SvgProcessor::default()
        .read(&mut Cursor::new(SQUARE.to_vec()))
        .unwrap()
}

#[test]
fn sniffs_svg_documents() {
    let processor = SvgProcessor::default();
    assert!(processor.can_read(&mut Cursor::new(SQUARE.to_vec())));
    assert!(processor.can_read(&mut Cursor::new(b"  <svg/>".to_vec())));
    assert!(!processor.can_read(&mut Cursor::new(b"<html></html>".to_vec())));
    assert!(!processor.can_read(&mut Cursor::new(b"\x89PNG\r\n\x1a\n".to_vec())));
}

#[test]
fn read_reports_document_size() {
    let asset = svg();
    assert_eq!(asset.mime_type().to_string(), "image/svg+xml");
    assert_eq!((asset.width(), asset.height()), (Some(20), Some(10)));
    assert_eq!(asset.essence_bytes(), SQUARE);
}

#[test]
fn malformed_svg_is_unsupported() {
    let err = SvgProcessor::default()
        .read(&mut Cursor::new(b"<svg".to_vec()))
        .unwrap_err();
    assert!(matches!(err, MadamError::UnsupportedFormat(_)));
}

#[test]
fn rasterize_renders_scaled_pixels() {
    let png = MimeType::parse("image/png").unwrap();
    let raster = SvgProcessor::default()
        .rasterize(png.clone(), 40, 20)
        .apply(svg().with_tag("logo"))
        .unwrap();

    assert_eq!(raster.mime_type(), &png);
    assert_eq!((raster.width(), raster.height()), (Some(40), Some(20)));
    assert!(raster.has_tag("logo"));

    let image = image::load_from_memory(raster.essence_bytes())
        .unwrap()
        .to_rgba8();
    assert_eq!(image.dimensions(), (40, 20));
    assert_eq!(image.get_pixel(5, 10).0, [255, 0, 0, 255]);
    assert_eq!(image.get_pixel(35, 10).0[3], 0);
}

#[test]
fn rasterize_rejects_bad_targets() {
    let processor = SvgProcessor::default();
    let err = processor
        .rasterize(MimeType::parse("image/svg+xml").unwrap(), 10, 10)
        .apply(svg())
        .unwrap_err();
    assert!(matches!(err, MadamError::UnsupportedFormat(_)));

    let err = processor
        .rasterize(MimeType::parse("image/png").unwrap(), 0, 10)
        .apply(svg())
        .unwrap_err();
    assert!(matches!(err, MadamError::Operator(_)));
}

#[test]
fn writes_svg_only() {
    let processor = SvgProcessor::default();
    let asset = svg();
    assert!(processor.can_write(&asset));
    let mut out = Vec::new();
    processor.write(&asset, &mut out).unwrap();
    assert_eq!(out, SQUARE);

    let png = Asset::new(vec![0u8; 4], MimeType::parse("image/png").unwrap());
    assert!(!processor.can_write(&png));
}

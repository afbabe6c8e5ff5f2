use serde_json::json;

use super::*;

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
struct Quality {
    quality: u8,
    progressive: bool,
}

#[test]
fn mime_section_overrides_media_type_section() {
    let config = Config::new()
        .with("image", "quality", 70)
        .with("image", "progressive", true)
        .with("image/jpeg", "quality", 95);

    let jpeg: Quality = config
        .options_for(&MimeType::parse("image/jpeg").unwrap())
        .unwrap();
    assert_eq!(
        jpeg,
        Quality {
            quality: 95,
            progressive: true
        }
    );

    let png: Quality = config
        .options_for(&MimeType::parse("image/png").unwrap())
        .unwrap();
    assert_eq!(png.quality, 70);
}

#[test]
fn nested_objects_are_merged() {
    let config = Config::from_json_str(
        r#"{
            "video": { "video": { "codec": "libx264" } },
            "video/ogg": { "video": { "bitrate": 800 } }
        }"#,
    )
    .unwrap();

    let section = config.section(&MimeType::parse("video/ogg").unwrap());
    assert_eq!(
        section.get("video"),
        Some(&json!({ "codec": "libx264", "bitrate": 800 }))
    );
}

#[test]
fn missing_sections_yield_defaults() {
    let config = Config::new();
    let opts: Quality = config.options("ffmpeg").unwrap();
    assert_eq!(opts, Quality::default());
    assert!(config.raw_section("image").is_none());
}

#[test]
fn invalid_json_is_a_config_error() {
    let err = Config::from_json_str("[1, 2]").unwrap_err();
    assert!(matches!(err, MadamError::Config(_)));

    let config = Config::new().with("image/jpeg", "quality", "high");
    let err = config
        .options_for::<Quality>(&MimeType::parse("image/jpeg").unwrap())
        .unwrap_err();
    assert!(err.to_string().contains("image/jpeg"));
}

#[test]
fn load_reads_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("madam.json");
    std::fs::write(&path, r#"{ "ffmpeg": { "threads": 3 } }"#).unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(
        config.raw_section("ffmpeg").and_then(|s| s.get("threads")),
        Some(&json!(3))
    );

    assert!(Config::load(dir.path().join("missing.json")).is_err());
}

use super::*;

fn format(container: &str, stream: &str) -> MadamResult<Format> {
    let probe: Probe = serde_json::from_str(&format!(
        r#"{{"format": {{"format_name": "{container}"}},
            "streams": [{{"codec_type": "{stream}"}}]}}"#
    ))
    .unwrap();
    Format::of(&probe)
}

#[test]
fn key_tables_follow_the_container() {
    let mp3 = format("mp3", "audio").unwrap();
    assert_eq!(mp3.muxer, "mp3");
    assert_eq!(mp3.raw_key("bpm"), Some("TBPM"));
    assert_eq!(mp3.domain_key("TBPM"), Some("bpm"));
    assert_eq!(mp3.domain_key("title"), Some("title"));

    let ogg = format("ogg", "audio").unwrap();
    assert_eq!(ogg.raw_key("artist"), Some("ARTIST"));
    assert_eq!(ogg.domain_key("artist"), Some("artist"));
    assert_eq!(ogg.domain_key("Tracktotal"), Some("tracks"));
    assert_eq!(ogg.domain_key("REPLAYGAIN_TRACK_GAIN"), None);

    let mkv = format("matroska,webm", "video").unwrap();
    assert_eq!(mkv.raw_key("title"), None);
}

#[test]
fn unknown_containers_are_unsupported() {
    assert!(matches!(
        format("png_pipe", "video"),
        Err(MadamError::UnsupportedFormat(_))
    ));
}

#[test]
fn scalar_values_become_text() {
    assert_eq!(text("track", &MetadataValue::Int(3)).unwrap(), "3");
    assert_eq!(text("bpm", &MetadataValue::Float(120.5)).unwrap(), "120.5");
    assert_eq!(text("title", &"Intro".into()).unwrap(), "Intro");
    assert!(text("title", &MetadataValue::List(vec![])).is_err());
}

#[test]
fn tables_are_bijective() {
    for &(_, _, keys) in FORMATS {
        for (i, (key, raw)) in keys.iter().enumerate() {
            for (other_key, other_raw) in &keys[i + 1..] {
                assert_ne!(key, other_key);
                assert!(!raw.eq_ignore_ascii_case(other_raw), "{raw} is mapped twice");
            }
        }
    }
}

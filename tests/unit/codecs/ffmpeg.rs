use super::*;

fn probe(json: &str) -> Probe {
    serde_json::from_str(json).unwrap()
}

fn strings(args: &Args) -> Vec<String> {
    args.as_slice()
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}

#[test]
fn probe_maps_container_and_dominant_stream() {
    let video = probe(
        r#"{
            "format": {"format_name": "matroska,webm", "duration": "2.500000"},
            "streams": [
                {"codec_type": "audio", "codec_name": "opus"},
                {"codec_type": "video", "codec_name": "vp9", "width": 64, "height": 48}
            ]
        }"#,
    );
    assert_eq!(video.mime_type().unwrap().to_string(), "video/x-matroska");
    assert_eq!(video.duration(), Some(2.5));

    let audio =
        probe(r#"{"format": {"format_name": "ogg"}, "streams": [{"codec_type": "audio"}]}"#);
    assert_eq!(audio.mime_type().unwrap().to_string(), "audio/ogg");

    let image = probe(
        r#"{"format": {"format_name": "png_pipe"}, "streams": [{"codec_type": "video"}]}"#,
    );
    assert!(image.mime_type().is_none());
    let empty = probe(r#"{"format": {"format_name": "mp3"}}"#);
    assert!(empty.mime_type().is_none());
}

#[test]
fn stream_tags_override_container_tags() {
    let p = probe(
        r#"{
            "format": {"format_name": "ogg", "tags": {"ARTIST": "container", "DATE": "2001"}},
            "streams": [{"codec_type": "audio", "tags": {"ARTIST": "stream"}}]
        }"#,
    );
    let tags = p.tags();
    assert_eq!(tags["ARTIST"], "stream");
    assert_eq!(tags["DATE"], "2001");
}

#[test]
fn requested_stream_options_fall_back_to_configured_ones() {
    let configured = StreamOptions::codec("libx264").with_bitrate(1200.0);
    let merged = StreamOptions::default()
        .with_bitrate(800.0)
        .or(Some(&configured));
    assert_eq!(merged.codec.as_deref(), Some("libx264"));
    assert_eq!(merged.bitrate, Some(800.0));
    assert!(!merged.disabled);

    assert!(StreamOptions::disabled().or(Some(&configured)).disabled);
    assert_eq!(StreamOptions::codec("vp9").or(None), StreamOptions::codec("vp9"));
}

#[test]
fn stream_options_become_ffmpeg_flags() {
    let mut args = Args::default();
    stream_args(&mut args, "video", &StreamOptions::codec("libx264").with_bitrate(1500.7));
    stream_args(&mut args, "audio", &StreamOptions::disabled());
    stream_args(&mut args, "subtitles", &StreamOptions::codec("ass").with_bitrate(10.0));
    assert_eq!(
        strings(&args),
        ["-c:v", "libx264", "-b:v", "1500k", "-an", "-c:s", "ass"]
    );
}

#[test]
fn stream_options_deserialize_from_config() {
    let config = Config::from_json_str(
        r#"{"video/x-matroska": {
            "video": {"codec": "libvpx-vp9", "bitrate": 900},
            "audio": {"disabled": true}
        }}"#,
    )
    .unwrap();
    let defaults: ConvertDefaults = config
        .options_for(&MimeType::parse("video/x-matroska").unwrap())
        .unwrap();
    assert_eq!(
        defaults.video,
        Some(StreamOptions::codec("libvpx-vp9").with_bitrate(900.0))
    );
    assert_eq!(defaults.audio, Some(StreamOptions::disabled()));
    assert!(defaults.subtitles.is_none());
}

#[test]
fn tool_options_have_defaults() {
    let options: FfmpegOptions = Config::new().options("ffmpeg").unwrap();
    assert_eq!(options, FfmpegOptions::default());

    let config = Config::new()
        .with("ffmpeg", "threads", 3)
        .with("ffmpeg", "ffprobe", "/opt/ffprobe");
    let options: FfmpegOptions = config.options("ffmpeg").unwrap();
    assert_eq!(options.threads, 3);
    assert_eq!(options.ffprobe, PathBuf::from("/opt/ffprobe"));
    assert_eq!(options.ffmpeg, PathBuf::from("ffmpeg"));
}

#[test]
fn missing_ffprobe_is_reported() {
    let config = Config::new().with("ffmpeg", "ffprobe", "/nonexistent/madam-ffprobe");
    assert!(FfmpegProcessor::new(config).is_err());
}

#[test]
fn muxers_cover_audio_video_and_frames() {
    assert_eq!(muxer(&MimeType::parse("audio/mpeg").unwrap()), Some("mp3"));
    assert_eq!(muxer(&MimeType::parse("image/png").unwrap()), Some("image2"));
    assert_eq!(muxer(&MimeType::parse("text/plain").unwrap()), None);
    assert_eq!(
        lookup(FRAME_CODECS, &MimeType::parse("image/jpeg").unwrap()),
        Some("mjpeg")
    );
}

#[test]
fn workspace_is_removed_on_drop() {
    let work = Workspace::new(b"payload").unwrap();
    let dir = work.input.parent().unwrap().to_path_buf();
    assert_eq!(std::fs::read(&work.input).unwrap(), b"payload");
    assert_eq!(work.file("x.txt"), dir.join("x.txt"));
    assert!(work.into_output().is_err());
    assert!(!dir.exists());
}

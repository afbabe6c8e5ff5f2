use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;
use serde::Deserialize;
use tempfile::TempDir;
use tracing::{debug, trace};

use crate::asset::{Asset, Metadata, MetadataValue};
use crate::codecs::geometry::{ResizeMode, resize_dimensions};
use crate::foundation::config::Config;
use crate::foundation::error::{MadamError, MadamResult};
use crate::foundation::mime::MimeType;
use crate::operator::{BoundOperator, Transform};
use crate::registry::{Processor, ReadSeek};

/// `(demuxer name, dominant stream type)` reported by ffprobe, and the resulting MIME type.
const CONTAINERS: &[((&str, &str), &str)] = &[
    (("matroska,webm", "video"), "video/x-matroska"),
    (("mov,mp4,m4a,3gp,3g2,mj2", "video"), "video/quicktime"),
    (("ogg", "video"), "video/ogg"),
    (("mp3", "audio"), "audio/mpeg"),
    (("ogg", "audio"), "audio/ogg"),
    (("wav", "audio"), "audio/wav"),
];

/// Muxer used to write each MIME type.
const MUXERS: &[(&str, &str)] = &[
    ("video/x-matroska", "matroska"),
    ("video/quicktime", "mov"),
    ("video/ogg", "ogg"),
    ("audio/mpeg", "mp3"),
    ("audio/ogg", "ogg"),
    ("audio/wav", "wav"),
    ("image/gif", "gif"),
    ("image/jpeg", "image2"),
    ("image/png", "image2"),
];

/// Video codec used for single-frame image output.
const FRAME_CODECS: &[(&str, &str)] = &[
    ("image/gif", "gif"),
    ("image/jpeg", "mjpeg"),
    ("image/png", "png"),
];

fn muxer(mime: &MimeType) -> Option<&'static str> {
    lookup(MUXERS, mime)
}

fn lookup(table: &[(&'static str, &'static str)], mime: &MimeType) -> Option<&'static str> {
    table
        .iter()
        .find(|(m, _)| MimeType::known(m) == *mime)
        .map(|&(_, v)| v)
}

/// Location of the ffmpeg tools and worker thread count, from the `ffmpeg` config section.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct FfmpegOptions {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    /// Encoder threads; `0` uses the available parallelism.
    pub threads: usize,
}

impl Default for FfmpegOptions {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            threads: 0,
        }
    }
}

/// Encoding settings for one kind of stream in [`FfmpegOp::Convert`].
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    /// Encoder name understood by ffmpeg (`libx264`, `libopus`, ...).
    pub codec: Option<String>,
    /// Target bitrate in kbit/s.
    pub bitrate: Option<f64>,
    /// Drop streams of this kind from the output.
    pub disabled: bool,
}

impl StreamOptions {
    pub fn codec(codec: impl Into<String>) -> Self {
        Self {
            codec: Some(codec.into()),
            ..Self::default()
        }
    }

    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    pub fn with_bitrate(mut self, kbps: f64) -> Self {
        self.bitrate = Some(kbps);
        self
    }

    /// Fill unset fields from `fallback`.
    fn or(self, fallback: Option<&StreamOptions>) -> StreamOptions {
        let Some(fallback) = fallback else {
            return self;
        };
        StreamOptions {
            codec: self.codec.or_else(|| fallback.codec.clone()),
            bitrate: self.bitrate.or(fallback.bitrate),
            disabled: self.disabled || fallback.disabled,
        }
    }
}

/// Per-stream defaults configured under a target MIME type section.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct ConvertDefaults {
    video: Option<StreamOptions>,
    audio: Option<StreamOptions>,
    subtitles: Option<StreamOptions>,
}

/// Audio and video transforms supported by [`FfmpegProcessor`].
#[derive(Clone, Debug, PartialEq)]
pub enum FfmpegOp {
    Resize {
        width: u32,
        height: u32,
        mode: ResizeMode,
    },
    Convert {
        mime_type: MimeType,
        video: Option<StreamOptions>,
        audio: Option<StreamOptions>,
        subtitles: Option<StreamOptions>,
    },
    /// Keep `from..to` seconds; a non-positive `to` counts back from the end.
    Trim { from: f64, to: f64 },
    /// Single frame at `seconds` as an image.
    ExtractFrame { mime_type: MimeType, seconds: f64 },
}

#[derive(Debug, Deserialize)]
pub(crate) struct Probe {
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    format_name: String,
    duration: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    bit_rate: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

impl Probe {
    /// MIME type from the demuxer and the dominant stream type (video beats audio).
    pub(crate) fn mime_type(&self) -> Option<MimeType> {
        let kinds = || self.streams.iter().filter_map(|s| s.codec_type.as_deref());
        let stream_type = if kinds().any(|k| k == "video") {
            "video"
        } else if kinds().any(|k| k == "audio") {
            "audio"
        } else {
            ""
        };
        CONTAINERS
            .iter()
            .find(|((demuxer, kind), _)| {
                *demuxer == self.format.format_name && *kind == stream_type
            })
            .map(|&(_, mime)| MimeType::known(mime))
    }

    /// Container tags overlaid by stream tags.
    pub(crate) fn tags(&self) -> BTreeMap<String, String> {
        let mut tags = self.format.tags.clone();
        for stream in &self.streams {
            tags.extend(stream.tags.clone());
        }
        tags
    }

    fn duration(&self) -> Option<f64> {
        self.format.duration.as_deref()?.parse().ok()
    }
}

/// Handle on the ffmpeg and ffprobe executables.
#[derive(Clone, Debug)]
pub(crate) struct FfmpegTool {
    options: FfmpegOptions,
}

impl FfmpegTool {
    /// Load options from `config` and check that ffprobe runs.
    pub(crate) fn new(config: &Config) -> MadamResult<Self> {
        let options: FfmpegOptions = config.options("ffmpeg")?;
        let out = Command::new(&options.ffprobe)
            .arg("-version")
            .output()
            .with_context(|| format!("run '{} -version'", options.ffprobe.display()))?;
        if !out.status.success() {
            return Err(MadamError::config(format!(
                "'{}' is not a usable ffprobe",
                options.ffprobe.display()
            )));
        }
        let banner = String::from_utf8_lossy(&out.stdout);
        debug!(version = banner.lines().next().unwrap_or_default(), "found ffprobe");
        Ok(Self { options })
    }

    pub(crate) fn probe(&self, data: &[u8]) -> MadamResult<Probe> {
        let work = Workspace::new(data)?;
        let mut cmd = Command::new(&self.options.ffprobe);
        cmd.args([
            "-loglevel",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(&work.input);
        trace!(command = ?cmd, "probe");
        let out = cmd
            .output()
            .with_context(|| format!("run '{}'", self.options.ffprobe.display()))?;
        if !out.status.success() {
            return Err(MadamError::unsupported(format!(
                "ffprobe rejected the input: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        serde_json::from_slice(&out.stdout)
            .map_err(|e| MadamError::unsupported(format!("unexpected ffprobe output: {e}")))
    }

    /// Run ffmpeg with `args`; a non-zero exit becomes an operator error carrying stderr.
    pub(crate) fn run(&self, what: &str, args: &[OsString]) -> MadamResult<()> {
        let mut cmd = Command::new(&self.options.ffmpeg);
        cmd.args(args);
        trace!(command = ?cmd, "ffmpeg");
        let out = cmd
            .output()
            .with_context(|| format!("run '{}'", self.options.ffmpeg.display()))?;
        if !out.status.success() {
            return Err(MadamError::operator(format!(
                "could not {what}: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(())
    }

    fn threads(&self) -> String {
        let threads = match self.options.threads {
            0 => std::thread::available_parallelism().map_or(1, usize::from),
            n => n,
        };
        threads.to_string()
    }
}

/// Temporary directory holding the input file and receiving the output file.
pub(crate) struct Workspace {
    _dir: TempDir,
    pub(crate) input: PathBuf,
    pub(crate) output: PathBuf,
}

impl Workspace {
    pub(crate) fn new(input: &[u8]) -> MadamResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("madam")
            .tempdir()
            .context("create ffmpeg workspace")?;
        let input_path = dir.path().join("input_file");
        std::fs::write(&input_path, input).context("write ffmpeg input")?;
        Ok(Self {
            input: input_path,
            output: dir.path().join("output_file"),
            _dir: dir,
        })
    }

    pub(crate) fn file(&self, name: &str) -> PathBuf {
        self.input.with_file_name(name)
    }

    pub(crate) fn into_output(self) -> MadamResult<Vec<u8>> {
        read_file(&self.output)
    }
}

fn read_file(path: &Path) -> MadamResult<Vec<u8>> {
    Ok(std::fs::read(path).with_context(|| format!("read '{}'", path.display()))?)
}

/// Argument list builder mixing string literals and paths.
#[derive(Default)]
pub(crate) struct Args(Vec<OsString>);

impl Args {
    pub(crate) fn new(initial: &[&str]) -> Self {
        let mut args = Self::default();
        args.extend(initial);
        args
    }

    pub(crate) fn push(&mut self, arg: impl Into<OsString>) -> &mut Self {
        self.0.push(arg.into());
        self
    }

    pub(crate) fn extend(&mut self, args: &[&str]) -> &mut Self {
        self.0.extend(args.iter().map(OsString::from));
        self
    }

    pub(crate) fn path(&mut self, path: &Path) -> &mut Self {
        self.push(path.as_os_str())
    }

    pub(crate) fn as_slice(&self) -> &[OsString] {
        &self.0
    }
}

/// Audio and video codec driving the `ffmpeg` and `ffprobe` executables.
#[derive(Clone, Debug)]
pub struct FfmpegProcessor {
    tool: FfmpegTool,
    config: Config,
}

impl FfmpegProcessor {
    /// Fails when the configured ffprobe cannot be run.
    pub fn new(config: Config) -> MadamResult<Self> {
        Ok(Self {
            tool: FfmpegTool::new(&config)?,
            config,
        })
    }

    pub fn resize(&self, width: u32, height: u32, mode: ResizeMode) -> BoundOperator<Self> {
        self.bind(FfmpegOp::Resize {
            width,
            height,
            mode,
        })
    }

    pub fn convert(
        &self,
        mime_type: MimeType,
        video: Option<StreamOptions>,
        audio: Option<StreamOptions>,
        subtitles: Option<StreamOptions>,
    ) -> BoundOperator<Self> {
        self.bind(FfmpegOp::Convert {
            mime_type,
            video,
            audio,
            subtitles,
        })
    }

    pub fn trim(&self, from: f64, to: f64) -> BoundOperator<Self> {
        self.bind(FfmpegOp::Trim { from, to })
    }

    pub fn extract_frame(&self, mime_type: MimeType, seconds: f64) -> BoundOperator<Self> {
        self.bind(FfmpegOp::ExtractFrame { mime_type, seconds })
    }

    fn resize_asset(
        &self,
        asset: Asset,
        (width, height): (u32, u32),
        mode: ResizeMode,
    ) -> MadamResult<Asset> {
        let mime = asset.mime_type().clone();
        let encoder =
            muxer(&mime).ok_or_else(|| MadamError::unsupported(format!("cannot resize {mime}")))?;
        if !matches!(mime.type_(), Some("image" | "video")) {
            return Err(MadamError::operator(format!("cannot resize assets of type {mime}")));
        }
        let source = match (mode, asset.width().zip(asset.height())) {
            (_, Some(dimensions)) => dimensions,
            (ResizeMode::Exact, None) => (width, height),
            (_, None) => return Err(MadamError::operator("source dimensions are unknown")),
        };
        let (w, h) = resize_dimensions(source, (width, height), mode)?;

        let work = Workspace::new(asset.essence_bytes())?;
        let mut args = Args::new(&["-loglevel", "error", "-f", encoder, "-i"]);
        args.path(&work.input)
            .extend(&["-filter:v"])
            .push(format!("scale={w}:{h}"))
            .extend(&["-threads"])
            .push(self.tool.threads())
            .extend(&["-f", encoder, "-y"])
            .path(&work.output);
        self.tool.run("resize asset", args.as_slice())?;

        let mut out = asset
            .derive(work.into_output()?, mime)
            .with("width", w)
            .with("height", h);
        if let Some(duration) = asset.duration() {
            out = out.with("duration", duration);
        }
        Ok(out)
    }

    fn convert_asset(
        &self,
        asset: Asset,
        mime: &MimeType,
        streams: [(&str, Option<&StreamOptions>); 3],
    ) -> MadamResult<Asset> {
        let encoder = muxer(mime)
            .ok_or_else(|| MadamError::unsupported(format!("cannot convert to {mime}")))?;
        let defaults: ConvertDefaults = self.config.options_for(mime)?;
        let configured = |kind: &str| match kind {
            "video" => defaults.video.as_ref(),
            "audio" => defaults.audio.as_ref(),
            _ => defaults.subtitles.as_ref(),
        };

        let work = Workspace::new(asset.essence_bytes())?;
        let mut args = Args::new(&["-loglevel", "error", "-i"]);
        args.path(&work.input);
        for (kind, requested) in streams {
            let options = match requested {
                Some(requested) => requested.clone().or(configured(kind)),
                None => match configured(kind) {
                    Some(options) => options.clone(),
                    None => continue,
                },
            };
            stream_args(&mut args, kind, &options);
        }
        args.extend(&["-threads"])
            .push(self.tool.threads())
            .extend(&["-f", encoder, "-y"])
            .path(&work.output);
        self.tool.run("convert asset", args.as_slice())?;

        let mut out = asset.derive(work.into_output()?, mime.clone());
        if matches!(mime.type_(), Some("image" | "video")) {
            if let Some(width) = asset.width() {
                out = out.with("width", width);
            }
            if let Some(height) = asset.height() {
                out = out.with("height", height);
            }
        }
        if matches!(mime.type_(), Some("audio" | "video"))
            && let Some(duration) = asset.duration()
        {
            out = out.with("duration", duration);
        }
        Ok(out)
    }

    fn trim_asset(&self, asset: Asset, from: f64, to: f64) -> MadamResult<Asset> {
        let mime = asset.mime_type().clone();
        let encoder = muxer(&mime)
            .filter(|_| matches!(mime.type_(), Some("audio" | "video")))
            .ok_or_else(|| MadamError::unsupported(format!("cannot trim {mime}")))?;
        let to = if to <= 0.0 {
            let total = asset
                .duration()
                .ok_or_else(|| MadamError::operator("source duration is unknown"))?;
            total + to
        } else {
            to
        };
        let duration = to - from;
        if duration <= 0.0 {
            return Err(MadamError::operator(format!(
                "start time {from}s must be before end time {to}s"
            )));
        }

        let work = Workspace::new(asset.essence_bytes())?;
        let mut args = Args::new(&["-v", "error", "-ss"]);
        args.push(from.to_string())
            .extend(&["-t"])
            .push(duration.to_string())
            .extend(&["-i"])
            .path(&work.input)
            .extend(&["-codec", "copy", "-f", encoder, "-y"])
            .path(&work.output);
        self.tool.run("trim asset", args.as_slice())?;

        let mut out = asset
            .derive(work.into_output()?, mime)
            .with("duration", duration);
        if let Some((width, height)) = asset.width().zip(asset.height()) {
            out = out.with("width", width).with("height", height);
        }
        Ok(out)
    }

    fn extract_frame_asset(
        &self,
        asset: Asset,
        mime: &MimeType,
        seconds: f64,
    ) -> MadamResult<Asset> {
        if asset.mime_type().type_() != Some("video") {
            return Err(MadamError::unsupported(format!(
                "cannot extract frames from {}",
                asset.mime_type()
            )));
        }
        let (Some(encoder), Some(codec)) = (muxer(mime), lookup(FRAME_CODECS, mime)) else {
            return Err(MadamError::unsupported(format!("cannot extract frames as {mime}")));
        };

        let work = Workspace::new(asset.essence_bytes())?;
        let mut args = Args::new(&["-v", "error", "-ss"]);
        args.push(seconds.to_string())
            .extend(&["-i"])
            .path(&work.input)
            .extend(&["-codec:v", codec, "-vframes", "1", "-f", encoder, "-y"])
            .path(&work.output);
        self.tool.run("extract frame", args.as_slice())?;

        let mut out =
            Asset::new(work.into_output()?, mime.clone()).with_tags(asset.tags().iter().cloned());
        if let Some((width, height)) = asset.width().zip(asset.height()) {
            out = out.with("width", width).with("height", height);
        }
        Ok(out)
    }
}

fn stream_args(args: &mut Args, kind: &str, options: &StreamOptions) {
    let (codec_flag, disable_flag, bitrate_flag) = match kind {
        "video" => ("-c:v", "-vn", Some("-b:v")),
        "audio" => ("-c:a", "-an", Some("-b:a")),
        _ => ("-c:s", "-sn", None),
    };
    if options.disabled {
        args.extend(&[disable_flag]);
        return;
    }
    if let Some(codec) = &options.codec {
        args.extend(&[codec_flag]).push(codec);
    }
    if let (Some(flag), Some(kbps)) = (bitrate_flag, options.bitrate)
        && kbps > 0.0
    {
        args.extend(&[flag]).push(format!("{}k", kbps.trunc() as u64));
    }
}

impl Processor for FfmpegProcessor {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn can_read(&self, stream: &mut dyn ReadSeek) -> bool {
        let mut data = Vec::new();
        if stream.read_to_end(&mut data).is_err() {
            return false;
        }
        self.tool
            .probe(&data)
            .is_ok_and(|probe| probe.mime_type().is_some())
    }

    fn read(&self, stream: &mut dyn ReadSeek) -> MadamResult<Asset> {
        let mut essence = Vec::new();
        stream
            .read_to_end(&mut essence)
            .context("read media stream")?;
        let probe = self.tool.probe(&essence)?;
        let mime = probe.mime_type().ok_or_else(|| {
            MadamError::unsupported(format!("unknown container '{}'", probe.format.format_name))
        })?;

        let mut asset = Asset::new(essence, mime.clone());
        if let Some(duration) = probe.duration() {
            asset = asset.with("duration", duration);
        }
        let (mut width, mut height) = (None::<u32>, None::<u32>);
        let mut described = Vec::new();
        for stream in &probe.streams {
            width = width.max(stream.width);
            height = height.max(stream.height);
            let Some(kind) = stream
                .codec_type
                .as_deref()
                .filter(|k| matches!(*k, "audio" | "video"))
            else {
                continue;
            };
            // Only the first stream of each kind is described.
            if described.contains(&kind) {
                continue;
            }
            described.push(kind);
            let mut info = Metadata::new();
            if let Some(codec) = &stream.codec_name {
                info.insert("codec".into(), codec.as_str().into());
            }
            if let Some(bitrate) = stream.bit_rate.as_deref().and_then(|b| b.parse::<f64>().ok()) {
                info.insert("bitrate".into(), (bitrate / 1000.0).into());
            }
            asset = asset.with(kind, MetadataValue::Map(info));
        }
        if let Some(width) = width {
            asset = asset.with("width", width);
        }
        if let Some(height) = height {
            asset = asset.with("height", height);
        }
        debug!(%mime, streams = probe.streams.len(), "read media");
        Ok(asset)
    }

    fn can_write(&self, asset: &Asset) -> bool {
        CONTAINERS
            .iter()
            .any(|&(_, mime)| MimeType::known(mime) == *asset.mime_type())
    }

    fn write(&self, asset: &Asset, out: &mut dyn Write) -> MadamResult<()> {
        out.write_all(asset.essence_bytes())
            .context("write media essence")?;
        Ok(())
    }
}

impl Transform for FfmpegProcessor {
    type Op = FfmpegOp;

    #[tracing::instrument(skip(self, asset), fields(mime_type = %asset.mime_type()))]
    fn transform(&self, asset: Asset, op: &FfmpegOp) -> MadamResult<Asset> {
        match op {
            FfmpegOp::Resize {
                width,
                height,
                mode,
            } => self.resize_asset(asset, (*width, *height), *mode),
            FfmpegOp::Convert {
                mime_type,
                video,
                audio,
                subtitles,
            } => self.convert_asset(
                asset,
                mime_type,
                [
                    ("video", video.as_ref()),
                    ("audio", audio.as_ref()),
                    ("subtitles", subtitles.as_ref()),
                ],
            ),
            FfmpegOp::Trim { from, to } => self.trim_asset(asset, *from, *to),
            FfmpegOp::ExtractFrame { mime_type, seconds } => {
                self.extract_frame_asset(asset, mime_type, *seconds)
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/codecs/ffmpeg.rs"]
mod tests;

use std::io::Read;

use anyhow::Context;
use tracing::debug;

use crate::asset::{Metadata, MetadataValue, Namespaces};
use crate::codecs::ffmpeg::{Args, FfmpegTool, Probe, Workspace};
use crate::ffmetadata::{FfMetadata, FfSection, GLOBAL_SECTION};
use crate::foundation::config::Config;
use crate::foundation::error::{MadamError, MadamResult};
use crate::foundation::mime::MimeType;
use crate::registry::{MetadataProcessor, ReadSeek};

/// Namespace owned by [`FfmpegMetadataProcessor`].
pub const FFMETADATA_NAMESPACE: &str = "ffmetadata";

/// ID3v2 frames as exposed by ffmpeg's mp3 demuxer and muxer.
const MP3_KEYS: &[(&str, &str)] = &[
    ("album", "album"),
    ("album_artist", "album_artist"),
    ("album_sort", "album-sort"),
    ("artist", "artist"),
    ("artist_sort", "artist-sort"),
    ("bpm", "TBPM"),
    ("composer", "composer"),
    ("performer", "performer"),
    ("content_group", "TIT1"),
    ("copyright", "copyright"),
    ("date", "date"),
    ("disc", "disc"),
    ("disc_subtitle", "TSST"),
    ("encoded_by", "encoded_by"),
    ("encoder", "encoder"),
    ("encoding_time", "TDEN"),
    ("file_type", "TFLT"),
    ("genre", "genre"),
    ("isrc", "TSRC"),
    ("initial_key", "TKEY"),
    ("involved_people", "TIPL"),
    ("language", "language"),
    ("length", "TLEN"),
    ("lyricist", "TEXT"),
    ("lyrics", "lyrics"),
    ("media_type", "TMED"),
    ("mood", "TMOO"),
    ("original_album", "TOAL"),
    ("original_artist", "TOPE"),
    ("original_date", "TDOR"),
    ("original_filename", "TOFN"),
    ("original_lyricist", "TOLY"),
    ("owner", "TOWN"),
    ("credits", "TMCL"),
    ("playlist_delay", "TDLY"),
    ("produced_by", "TPRO"),
    ("publisher", "publisher"),
    ("radio_station_name", "TRSN"),
    ("radio_station_owner", "TRSO"),
    ("remixed_by", "TP4"),
    ("tagging_date", "TDTG"),
    ("title", "title"),
    ("title_sort", "title-sort"),
    ("track", "track"),
    ("version", "TIT3"),
];

/// Vorbis comment fields.
const OGG_KEYS: &[(&str, &str)] = &[
    ("album", "ALBUM"),
    ("album_artist", "album_artist"),
    ("artist", "ARTIST"),
    ("comment", "comment"),
    ("composer", "COMPOSER"),
    ("contact", "CONTACT"),
    ("copyright", "COPYRIGHT"),
    ("date", "DATE"),
    ("disc", "disc"),
    ("encoded_by", "ENCODED-BY"),
    ("encoder", "ENCODER"),
    ("genre", "GENRE"),
    ("isrc", "ISRC"),
    ("license", "LICENSE"),
    ("location", "LOCATION"),
    ("performer", "PERFORMER"),
    ("produced_by", "ORGANIZATION"),
    ("title", "TITLE"),
    ("track", "track"),
    ("tracks", "TRACKTOTAL"),
    ("version", "VERSION"),
];

/// Key table and muxer per MIME type. Containers without a table carry no mapped tags.
const FORMATS: &[(&str, &str, &[(&str, &str)])] = &[
    ("video/x-matroska", "matroska", &[]),
    ("video/quicktime", "mov", &[]),
    ("video/ogg", "ogg", &[]),
    ("audio/mpeg", "mp3", MP3_KEYS),
    ("audio/ogg", "ogg", OGG_KEYS),
    ("audio/wav", "wav", &[]),
];

struct Format {
    mime: MimeType,
    muxer: &'static str,
    keys: &'static [(&'static str, &'static str)],
}

impl Format {
    fn of(probe: &Probe) -> MadamResult<Self> {
        let mime = probe
            .mime_type()
            .ok_or_else(|| MadamError::unsupported("unsupported metadata source"))?;
        FORMATS
            .iter()
            .find(|(m, _, _)| MimeType::known(m) == mime)
            .map(|&(_, muxer, keys)| Format { mime, muxer, keys })
            .ok_or_else(|| MadamError::unsupported("unsupported metadata source"))
    }

    /// Domain key for a raw ffmpeg tag; tag names compare case-insensitively.
    fn domain_key(&self, tag: &str) -> Option<&'static str> {
        self.keys
            .iter()
            .find(|(_, raw)| raw.eq_ignore_ascii_case(tag))
            .map(|&(key, _)| key)
    }

    fn raw_key(&self, key: &str) -> Option<&'static str> {
        self.keys
            .iter()
            .find(|(domain, _)| *domain == key)
            .map(|&(_, raw)| raw)
    }
}

/// Container tags of audio and video essences, exchanged with ffmpeg as FFmetadata text.
#[derive(Clone, Debug)]
pub struct FfmpegMetadataProcessor {
    tool: FfmpegTool,
}

impl FfmpegMetadataProcessor {
    /// Fails when the configured ffprobe cannot be run.
    pub fn new(config: Config) -> MadamResult<Self> {
        Ok(Self {
            tool: FfmpegTool::new(&config)?,
        })
    }

    fn load(&self, stream: &mut dyn ReadSeek) -> MadamResult<(Vec<u8>, Format)> {
        let mut data = Vec::new();
        stream
            .read_to_end(&mut data)
            .context("read media stream")?;
        let format = Format::of(&self.tool.probe(&data)?)?;
        Ok((data, format))
    }

    /// Global tags dumped by ffmpeg in FFmetadata form.
    fn dump(&self, data: &[u8]) -> MadamResult<FfSection> {
        let work = Workspace::new(data)?;
        let mut args = Args::new(&["-loglevel", "error", "-i"]);
        args.path(&work.input)
            .extend(&["-f", "ffmetadata", "-y"])
            .path(&work.output);
        self.tool.run("read metadata", args.as_slice())?;

        let text = String::from_utf8(work.into_output()?)
            .map_err(|e| MadamError::unsupported(format!("ffmetadata is not UTF-8: {e}")))?;
        let mut document = FfMetadata::parse(&text)?;
        Ok(document.remove(GLOBAL_SECTION).unwrap_or_default())
    }
}

fn text(key: &str, value: &MetadataValue) -> MadamResult<String> {
    match value {
        MetadataValue::Text(s) => Ok(s.clone()),
        MetadataValue::Int(v) => Ok(v.to_string()),
        MetadataValue::Float(v) => Ok(v.to_string()),
        MetadataValue::Bool(v) => Ok(v.to_string()),
        other => Err(MadamError::unsupported(format!(
            "ffmetadata key '{key}' cannot hold {other:?}"
        ))),
    }
}

impl MetadataProcessor for FfmpegMetadataProcessor {
    fn name(&self) -> &'static str {
        "ffmetadata"
    }

    fn formats(&self) -> &'static [&'static str] {
        &[FFMETADATA_NAMESPACE]
    }

    fn read(&self, stream: &mut dyn ReadSeek) -> MadamResult<Namespaces> {
        let mut data = Vec::new();
        stream
            .read_to_end(&mut data)
            .context("read media stream")?;
        let probe = self.tool.probe(&data)?;
        let format = Format::of(&probe)?;

        // Stream tags (Vorbis comments in Ogg) are not part of the global dump.
        let mut tags = self.dump(&data)?;
        tags.extend(probe.tags());

        let entries: Metadata = tags
            .into_iter()
            .filter_map(|(tag, value)| {
                let key = format.domain_key(&tag)?;
                Some((key.to_string(), MetadataValue::Text(value)))
            })
            .collect();
        debug!(mime = %format.mime, entries = entries.len(), "read ffmetadata");
        if entries.is_empty() {
            return Ok(Namespaces::new());
        }
        Ok(Namespaces::from([(FFMETADATA_NAMESPACE.to_string(), entries)]))
    }

    fn strip(&self, stream: &mut dyn ReadSeek) -> MadamResult<Vec<u8>> {
        let (data, format) = self.load(stream)?;
        let work = Workspace::new(&data)?;
        let mut args = Args::new(&["-loglevel", "error", "-i"]);
        args.path(&work.input)
            .extend(&["-map_metadata", "-1", "-codec", "copy", "-y", "-f", format.muxer])
            .path(&work.output);
        self.tool.run("strip metadata", args.as_slice())?;
        work.into_output()
    }

    fn combine(&self, stream: &mut dyn ReadSeek, metadata: &Namespaces) -> MadamResult<Vec<u8>> {
        if let Some(unknown) = metadata.keys().find(|ns| ns.as_str() != FFMETADATA_NAMESPACE) {
            return Err(MadamError::unsupported(format!(
                "metadata format '{unknown}' is not supported by the ffmetadata processor"
            )));
        }
        let (data, format) = self.load(stream)?;
        let Some(entries) = metadata.get(FFMETADATA_NAMESPACE).filter(|e| !e.is_empty()) else {
            return Ok(data);
        };

        let mut global = FfSection::new();
        for (key, value) in entries {
            let raw = format.raw_key(key).ok_or_else(|| {
                MadamError::unsupported(format!(
                    "metadata key '{key}' is not supported for {}",
                    format.mime
                ))
            })?;
            global.insert(raw.to_string(), text(key, value)?);
        }
        let mut document = FfMetadata::new();
        document.insert(GLOBAL_SECTION, global);

        let work = Workspace::new(&data)?;
        let tags = work.file("metadata.txt");
        std::fs::write(&tags, document.to_string()).context("write ffmetadata file")?;
        let mut args = Args::new(&["-loglevel", "error", "-f", format.muxer, "-i"]);
        args.path(&work.input)
            .extend(&["-f", "ffmetadata", "-i"])
            .path(&tags)
            .extend(&["-map", "0", "-map_metadata", "1", "-codec", "copy", "-y"])
            .extend(&["-f", format.muxer])
            .path(&work.output);
        self.tool.run("add metadata", args.as_slice())?;
        work.into_output()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/codecs/ffmpeg_metadata.rs"]
mod tests;

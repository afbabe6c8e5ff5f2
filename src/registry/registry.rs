use std::collections::BTreeMap;
use std::io::{Cursor, SeekFrom, Write};

use anyhow::Context;
use tracing::{debug, warn};

use crate::asset::{Asset, MADAM_NAMESPACE, Namespaces};
use crate::codecs::{
    ExifMetadataProcessor, FfmpegMetadataProcessor, FfmpegProcessor, ImageProcessor,
    IptcMetadataProcessor, SvgProcessor,
};
use crate::foundation::config::Config;
use crate::foundation::error::{MadamError, MadamResult};
use crate::registry::processor::{MetadataProcessor, Processor, ReadSeek};

/// Ordered codec lists plus the metadata format index.
///
/// Processors are probed in registration order and the first match wins. Metadata processors run
/// in registration order too; each format key belongs to exactly one of them, the most recently
/// registered.
#[derive(Default)]
pub struct Registry {
    processors: Vec<Box<dyn Processor>>,
    metadata_processors: Vec<Box<dyn MetadataProcessor>>,
    owners: BTreeMap<&'static str, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in codec.
    ///
    /// ffmpeg-backed codecs are skipped with a warning when `ffprobe` cannot be run.
    pub fn with_default_codecs(config: &Config) -> Self {
        let mut registry = Self::new();
        registry.register(SvgProcessor::new(config.clone()));
        registry.register(ImageProcessor::new(config.clone()));
        match FfmpegProcessor::new(config.clone()) {
            Ok(ffmpeg) => {
                registry.register(ffmpeg);
            }
            Err(err) => warn!(error = %err, "ffmpeg processor unavailable"),
        }
        registry.register_metadata(ExifMetadataProcessor::new());
        registry.register_metadata(IptcMetadataProcessor::new());
        match FfmpegMetadataProcessor::new(config.clone()) {
            Ok(ffmetadata) => {
                registry.register_metadata(ffmetadata);
            }
            Err(err) => warn!(error = %err, "ffmetadata processor unavailable"),
        }
        registry
    }

    /// Append a processor; earlier registrations take priority when probing.
    pub fn register(&mut self, processor: impl Processor + 'static) -> &mut Self {
        debug!(processor = processor.name(), "register processor");
        self.processors.push(Box::new(processor));
        self
    }

    /// Append a metadata processor and make it the owner of all its formats.
    pub fn register_metadata(&mut self, processor: impl MetadataProcessor + 'static) -> &mut Self {
        let index = self.metadata_processors.len();
        for &key in processor.formats() {
            if let Some(previous) = self.owners.insert(key, index) {
                debug!(
                    format = key,
                    previous = self.metadata_processors[previous].name(),
                    "metadata format reassigned"
                );
            }
        }
        self.metadata_processors.push(Box::new(processor));
        self
    }

    /// Names of registered processors in probe order.
    pub fn processor_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.processors.iter().map(|p| p.name())
    }

    /// The metadata processor currently owning `format`.
    pub fn metadata_processor(&self, format: &str) -> Option<&dyn MetadataProcessor> {
        self.owners
            .get(format)
            .map(|&i| self.metadata_processors[i].as_ref())
    }

    /// Detect the format of `stream`, decode it and separate every recognized metadata layer.
    ///
    /// Metadata extraction is best-effort: a metadata processor that fails is skipped and the
    /// asset keeps the essence it had before that step.
    #[tracing::instrument(skip(self, stream))]
    pub fn read(&self, stream: &mut dyn ReadSeek) -> MadamResult<Asset> {
        let start = stream
            .stream_position()
            .context("query source stream position")?;
        let processor = self.detect(stream, start)?;
        debug!(processor = processor.name(), "format detected");

        rewind(stream, start)?;
        let asset = processor.read(stream)?;

        let asset = self
            .metadata_processors
            .iter()
            .enumerate()
            .fold(asset, |asset, (index, metadata)| {
                let owned = self.owned_formats(index);
                if owned.is_empty() {
                    return asset;
                }
                match extract(stream, start, metadata.as_ref(), &owned, &asset) {
                    Ok(next) => next,
                    Err(err) => {
                        debug!(
                            metadata_processor = metadata.name(),
                            error = %err,
                            "metadata extraction skipped"
                        );
                        asset
                    }
                }
            });
        Ok(asset)
    }

    /// Re-embed every metadata namespace of `asset` and serialize it to `out`.
    #[tracing::instrument(skip(self, asset, out), fields(mime_type = %asset.mime_type()))]
    pub fn write(&self, asset: &Asset, out: &mut dyn Write) -> MadamResult<()> {
        let processor = self
            .processors
            .iter()
            .find(|p| p.can_write(asset))
            .ok_or_else(|| {
                MadamError::unsupported(format!("no processor can write {}", asset.mime_type()))
            })?;

        let mut by_owner: BTreeMap<usize, Namespaces> = BTreeMap::new();
        for (namespace, entries) in asset.metadata() {
            if namespace == MADAM_NAMESPACE || entries.is_empty() {
                continue;
            }
            let owner = self.owners.get(namespace.as_str()).ok_or_else(|| {
                MadamError::unsupported(format!("no metadata processor for '{namespace}'"))
            })?;
            by_owner
                .entry(*owner)
                .or_default()
                .insert(namespace.clone(), entries.clone());
        }

        let mut essence = asset.essence_bytes().to_vec();
        for (owner, namespaces) in &by_owner {
            let metadata = &self.metadata_processors[*owner];
            debug!(metadata_processor = metadata.name(), "combine metadata");
            let combined = metadata.combine(&mut Cursor::new(essence.as_slice()), namespaces)?;
            essence = combined;
        }

        debug!(processor = processor.name(), "write asset");
        processor.write(&asset.with_essence(essence), out)
    }

    fn detect(&self, stream: &mut dyn ReadSeek, start: u64) -> MadamResult<&dyn Processor> {
        for processor in &self.processors {
            rewind(stream, start)?;
            let accepted = processor.can_read(stream);
            rewind(stream, start)?;
            if accepted {
                return Ok(processor.as_ref());
            }
        }
        Err(MadamError::unsupported("no processor recognizes the content"))
    }

    fn owned_formats(&self, index: usize) -> Vec<&'static str> {
        self.owners
            .iter()
            .filter(|&(_, &owner)| owner == index)
            .map(|(&format, _)| format)
            .collect()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field(
                "processors",
                &self.processors.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("owners", &self.owners)
            .finish()
    }
}

fn rewind(stream: &mut dyn ReadSeek, start: u64) -> MadamResult<()> {
    stream
        .seek(SeekFrom::Start(start))
        .context("rewind source stream")?;
    Ok(())
}

/// One step of the metadata chain: read from the source, strip from the current essence.
fn extract(
    stream: &mut dyn ReadSeek,
    start: u64,
    metadata: &dyn MetadataProcessor,
    owned: &[&str],
    asset: &Asset,
) -> MadamResult<Asset> {
    rewind(stream, start)?;
    let namespaces = metadata.read(stream)?;
    let stripped = metadata.strip(&mut asset.essence())?;
    let namespaces: Namespaces = namespaces
        .into_iter()
        .filter(|(name, entries)| owned.contains(&name.as_str()) && !entries.is_empty())
        .collect();
    debug!(
        metadata_processor = metadata.name(),
        namespaces = namespaces.len(),
        "metadata extracted"
    );
    Ok(asset.with_essence(stripped).with_namespaces(namespaces))
}

#[cfg(test)]
#[path = "../../tests/unit/registry/registry.rs"]
mod tests;

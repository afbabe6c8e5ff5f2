//! madam is a digital asset management library.
//!
//! It reads binary content (raster and vector images, audio, video), separates the raw
//! **essence** from the metadata embedded in it (Exif, IPTC, container tags), and applies
//! declarative, non-destructive transforms to the result.
//!
//! # Pipeline overview
//!
//! 1. **Detect**: [`Registry::read`] probes registered [`Processor`]s in order; the first that
//!    recognizes the stream decodes it into an [`Asset`].
//! 2. **Separate**: every registered [`MetadataProcessor`] extracts the namespaces it owns and
//!    strips them from the essence. Failures are logged and skipped.
//! 3. **Transform**: codecs hand out [`BoundOperator`]s (`image.resize(..)`, `ffmpeg.trim(..)`)
//!    that a [`Pipeline`] applies lazily to any number of assets.
//! 4. **Write**: [`Registry::write`] re-embeds metadata and writes the essence back out.
//! 5. **Store** (optional): keep assets in an [`InMemoryStorage`] or a [`FileStorage`].
//!
//! Audio and video support shells out to the system `ffmpeg` and `ffprobe` binaries;
//! [`Registry::with_default_codecs`] leaves those codecs out when `ffprobe` cannot be run.
#![forbid(unsafe_code)]

/// Immutable essence plus namespaced metadata.
pub mod asset;
/// Image, vector, audio/video and metadata codecs.
pub mod codecs;
/// `;FFMETADATA1` text format.
pub mod ffmetadata;
/// Errors, MIME types and configuration.
pub mod foundation;
/// Operators and pipelines.
pub mod operator;
/// Codec traits and dispatch.
pub mod registry;
/// Asset collections.
pub mod storage;

pub use asset::{Asset, MADAM_NAMESPACE, Metadata, MetadataValue, Namespaces};
pub use codecs::{
    EXIF_NAMESPACE, ExifMetadataProcessor, FFMETADATA_NAMESPACE, FfmpegMetadataProcessor,
    FfmpegOp, FfmpegOptions, FfmpegProcessor, FlipOrientation, IPTC_NAMESPACE, ImageOp,
    ImageProcessor, IptcMetadataProcessor, JpegOptions, PngCompression, PngOptions, ResizeMode,
    StreamOptions, SvgOp, SvgProcessor,
};
pub use ffmetadata::{FfMetadata, FfSection, GLOBAL_SECTION, error::FfMetadataError};
pub use foundation::config::Config;
pub use foundation::error::{MadamError, MadamResult};
pub use foundation::mime::{MimeType, MimeTypeError};
pub use operator::{BoundOperator, Operator, Pipeline, Transform};
pub use registry::{MetadataProcessor, Processor, ReadSeek, Registry};
pub use storage::{AssetStorage, FileStorage, InMemoryStorage};

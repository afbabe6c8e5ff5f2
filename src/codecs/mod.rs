//! Concrete codecs: raster and vector images, audio/video through ffmpeg, and the Exif, IPTC and
//! FFmetadata metadata layers.

pub mod exif;
pub mod ffmpeg;
pub mod ffmpeg_metadata;
pub mod geometry;
pub mod image;
pub mod iptc;
mod jpeg;
pub mod vector;

pub use self::exif::{EXIF_NAMESPACE, ExifMetadataProcessor};
pub use ffmpeg::{FfmpegOp, FfmpegOptions, FfmpegProcessor, StreamOptions};
pub use ffmpeg_metadata::{FFMETADATA_NAMESPACE, FfmpegMetadataProcessor};
pub use geometry::{FlipOrientation, ResizeMode, resize_dimensions};
pub use self::image::{ImageOp, ImageProcessor, JpegOptions, PngCompression, PngOptions};
pub use iptc::{IPTC_NAMESPACE, IptcMetadataProcessor};
pub use vector::{SvgOp, SvgProcessor};

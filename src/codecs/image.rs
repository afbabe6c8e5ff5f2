use std::io::{Cursor, Read, Write};

use anyhow::Context;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, Rgba, RgbaImage};
use serde::Deserialize;
use tracing::debug;

use crate::asset::{Asset, MetadataValue};
use crate::codecs::exif::EXIF_NAMESPACE;
use crate::codecs::geometry::{FlipOrientation, ResizeMode, resize_dimensions};
use crate::foundation::config::Config;
use crate::foundation::error::{MadamError, MadamResult};
use crate::foundation::mime::MimeType;
use crate::operator::{BoundOperator, Transform};
use crate::registry::{Processor, ReadSeek};

/// Raster formats handled by [`ImageProcessor`].
const FORMATS: &[(&str, ImageFormat)] = &[
    ("image/gif", ImageFormat::Gif),
    ("image/jpeg", ImageFormat::Jpeg),
    ("image/png", ImageFormat::Png),
    ("image/webp", ImageFormat::WebP),
    ("image/bmp", ImageFormat::Bmp),
    ("image/tiff", ImageFormat::Tiff),
];

/// Bytes inspected when sniffing the format.
const PROBE_LEN: u64 = 64;

pub(crate) fn format_for(mime: &MimeType) -> Option<ImageFormat> {
    FORMATS
        .iter()
        .find(|(m, _)| MimeType::known(m) == *mime)
        .map(|&(_, f)| f)
}

pub(crate) fn mime_for(format: ImageFormat) -> Option<MimeType> {
    FORMATS
        .iter()
        .find(|&&(_, f)| f == format)
        .map(|&(m, _)| MimeType::known(m))
}

/// JPEG encoder settings.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct JpegOptions {
    /// 1 (worst) to 100 (best).
    pub quality: u8,
}

impl Default for JpegOptions {
    fn default() -> Self {
        Self { quality: 80 }
    }
}

/// PNG encoder settings.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PngOptions {
    pub compression: PngCompression,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PngCompression {
    Fast,
    #[default]
    Default,
    Best,
}

impl From<PngCompression> for CompressionType {
    fn from(value: PngCompression) -> Self {
        match value {
            PngCompression::Fast => CompressionType::Fast,
            PngCompression::Default => CompressionType::Default,
            PngCompression::Best => CompressionType::Best,
        }
    }
}

/// Raster transforms supported by [`ImageProcessor`].
#[derive(Clone, Debug, PartialEq)]
pub enum ImageOp {
    Resize {
        width: u32,
        height: u32,
        mode: ResizeMode,
    },
    /// Box in pixels; it may extend past the image and is clamped.
    Crop {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },
    /// Counter-clockwise rotation in degrees.
    Rotate { angle: f64, expand: bool },
    Flip(FlipOrientation),
    Transpose,
    /// Apply the Exif orientation tag.
    AutoOrient,
    Convert { mime_type: MimeType },
}

/// Raster image codec backed by the `image` crate.
#[derive(Clone, Debug, Default)]
pub struct ImageProcessor {
    config: Config,
}

impl ImageProcessor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn resize(&self, width: u32, height: u32, mode: ResizeMode) -> BoundOperator<Self> {
        self.bind(ImageOp::Resize {
            width,
            height,
            mode,
        })
    }

    pub fn crop(&self, x: i64, y: i64, width: u32, height: u32) -> BoundOperator<Self> {
        self.bind(ImageOp::Crop {
            x,
            y,
            width,
            height,
        })
    }

    pub fn rotate(&self, angle: f64, expand: bool) -> BoundOperator<Self> {
        self.bind(ImageOp::Rotate { angle, expand })
    }

    pub fn flip(&self, orientation: FlipOrientation) -> BoundOperator<Self> {
        self.bind(ImageOp::Flip(orientation))
    }

    pub fn transpose(&self) -> BoundOperator<Self> {
        self.bind(ImageOp::Transpose)
    }

    pub fn auto_orient(&self) -> BoundOperator<Self> {
        self.bind(ImageOp::AutoOrient)
    }

    pub fn convert(&self, mime_type: MimeType) -> BoundOperator<Self> {
        self.bind(ImageOp::Convert { mime_type })
    }

    /// Encode `image` as `mime`, honoring configured encoder options.
    pub(crate) fn encode(&self, image: &DynamicImage, mime: &MimeType) -> MadamResult<Vec<u8>> {
        let format = format_for(mime)
            .ok_or_else(|| MadamError::unsupported(format!("cannot encode images as {mime}")))?;
        let mut buf = Vec::new();
        let result = match format {
            ImageFormat::Jpeg => {
                let opts: JpegOptions = self.config.options_for(mime)?;
                let quality = opts.quality.clamp(1, 100);
                DynamicImage::ImageRgb8(image.to_rgb8())
                    .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
            }
            ImageFormat::Png => {
                let opts: PngOptions = self.config.options_for(mime)?;
                image.write_with_encoder(PngEncoder::new_with_quality(
                    &mut buf,
                    opts.compression.into(),
                    PngFilter::Adaptive,
                ))
            }
            ImageFormat::Tiff => image.write_to(&mut Cursor::new(&mut buf), format),
            _ => DynamicImage::ImageRgba8(image.to_rgba8())
                .write_to(&mut Cursor::new(&mut buf), format),
        };
        result.map_err(|e| MadamError::operator(format!("could not encode {mime}: {e}")))?;
        Ok(buf)
    }

    fn emit(&self, source: &Asset, image: &DynamicImage, mime: MimeType) -> MadamResult<Asset> {
        let essence = self.encode(image, &mime)?;
        Ok(source
            .derive(essence, mime)
            .with("width", image.width())
            .with("height", image.height()))
    }
}

impl Processor for ImageProcessor {
    fn name(&self) -> &'static str {
        "image"
    }

    fn can_read(&self, stream: &mut dyn ReadSeek) -> bool {
        let mut head = Vec::new();
        if stream.take(PROBE_LEN).read_to_end(&mut head).is_err() {
            return false;
        }
        image::guess_format(&head)
            .ok()
            .and_then(mime_for)
            .is_some()
    }

    fn read(&self, stream: &mut dyn ReadSeek) -> MadamResult<Asset> {
        let mut essence = Vec::new();
        stream
            .read_to_end(&mut essence)
            .context("read image stream")?;
        let mime = image::guess_format(&essence)
            .ok()
            .and_then(mime_for)
            .ok_or_else(|| MadamError::unsupported("unknown raster format"))?;
        let (width, height) = dimensions(&essence)
            .map_err(|e| MadamError::unsupported(format!("malformed {mime}: {e}")))?;
        debug!(%mime, width, height, "read image");
        Ok(Asset::new(essence, mime)
            .with("width", width)
            .with("height", height))
    }

    fn can_write(&self, asset: &Asset) -> bool {
        format_for(asset.mime_type()).is_some()
    }

    fn write(&self, asset: &Asset, out: &mut dyn Write) -> MadamResult<()> {
        out.write_all(asset.essence_bytes())
            .context("write image essence")?;
        Ok(())
    }
}

impl Transform for ImageProcessor {
    type Op = ImageOp;

    #[tracing::instrument(skip(self, asset), fields(mime_type = %asset.mime_type()))]
    fn transform(&self, asset: Asset, op: &ImageOp) -> MadamResult<Asset> {
        match op {
            ImageOp::Resize {
                width,
                height,
                mode,
            } => {
                let image = decode(&asset)?;
                let (w, h) =
                    resize_dimensions((image.width(), image.height()), (*width, *height), *mode)?;
                let resized = image.resize_exact(w, h, FilterType::Lanczos3);
                self.emit(&asset, &resized, asset.mime_type().clone())
            }
            ImageOp::Crop {
                x,
                y,
                width,
                height,
            } => {
                let (w, h) = dimensions(asset.essence_bytes())
                    .map_err(|e| MadamError::operator(format!("could not read image: {e}")))?;
                let x0 = (*x).clamp(0, i64::from(w));
                let y0 = (*y).clamp(0, i64::from(h));
                let x1 = x.saturating_add(i64::from(*width)).clamp(0, i64::from(w));
                let y1 = y.saturating_add(i64::from(*height)).clamp(0, i64::from(h));
                if x1 <= x0 || y1 <= y0 {
                    return Err(MadamError::operator(format!(
                        "crop box ({x}, {y}, {width}, {height}) lies outside the {w}x{h} image"
                    )));
                }
                if (x0, y0, x1, y1) == (0, 0, i64::from(w), i64::from(h)) {
                    return Ok(asset);
                }
                // Clamped to the image bounds, so the casts cannot truncate.
                let cropped = decode(&asset)?.crop_imm(
                    x0 as u32,
                    y0 as u32,
                    (x1 - x0) as u32,
                    (y1 - y0) as u32,
                );
                self.emit(&asset, &cropped, asset.mime_type().clone())
            }
            ImageOp::Rotate { angle, expand } => {
                let angle = angle.rem_euclid(360.0);
                if angle == 0.0 {
                    return Ok(asset);
                }
                let rotated = rotate_image(decode(&asset)?, angle, *expand);
                self.emit(&asset, &rotated, asset.mime_type().clone())
            }
            ImageOp::Flip(orientation) => {
                let image = decode(&asset)?;
                let flipped = match orientation {
                    FlipOrientation::Horizontal => image.fliph(),
                    FlipOrientation::Vertical => image.flipv(),
                };
                self.emit(&asset, &flipped, asset.mime_type().clone())
            }
            ImageOp::Transpose => {
                let transposed = decode(&asset)?.rotate90().fliph();
                self.emit(&asset, &transposed, asset.mime_type().clone())
            }
            ImageOp::AutoOrient => {
                let orientation = asset
                    .namespace(EXIF_NAMESPACE)
                    .and_then(|exif| exif.get("orientation"))
                    .and_then(MetadataValue::as_int);
                let Some(orientation) = orientation.filter(|&o| o != 1) else {
                    return Ok(asset);
                };
                let image = decode(&asset)?;
                let oriented = match orientation {
                    2 => image.fliph(),
                    3 => image.rotate180(),
                    4 => image.flipv(),
                    5 => image.rotate270().flipv(),
                    6 => image.rotate90(),
                    7 => image.rotate270().fliph(),
                    8 => image.rotate270(),
                    other => {
                        return Err(MadamError::operator(format!(
                            "unable to correct image orientation with value {other}"
                        )));
                    }
                };
                Ok(self
                    .emit(&asset, &oriented, asset.mime_type().clone())?
                    .without(EXIF_NAMESPACE, "orientation"))
            }
            ImageOp::Convert { mime_type } => {
                if format_for(mime_type).is_none() {
                    return Err(MadamError::unsupported(format!(
                        "cannot convert images to {mime_type}"
                    )));
                }
                let image = decode(&asset)?;
                self.emit(&asset, &image, mime_type.clone())
            }
        }
    }
}

fn rotate_image(image: DynamicImage, angle: f64, expand: bool) -> DynamicImage {
    let square = image.width() == image.height();
    if angle == 180.0 {
        image.rotate180()
    } else if angle == 90.0 && (expand || square) {
        image.rotate270()
    } else if angle == 270.0 && (expand || square) {
        image.rotate90()
    } else {
        DynamicImage::ImageRgba8(rotate_bilinear(&image.to_rgba8(), angle, expand))
    }
}

fn dimensions(essence: &[u8]) -> image::ImageResult<(u32, u32)> {
    ImageReader::new(Cursor::new(essence))
        .with_guessed_format()?
        .into_dimensions()
}

fn decode(asset: &Asset) -> MadamResult<DynamicImage> {
    let bytes = asset.essence_bytes();
    let decoded = match format_for(asset.mime_type()) {
        Some(format) => image::load_from_memory_with_format(bytes, format),
        None => image::load_from_memory(bytes),
    };
    decoded.map_err(|e| {
        MadamError::operator(format!("could not decode {}: {e}", asset.mime_type()))
    })
}

/// Rotate counter-clockwise by `angle` degrees around the center with bilinear sampling.
///
/// With `expand` the canvas grows to the rotated bounding box; uncovered pixels are transparent.
fn rotate_bilinear(src: &RgbaImage, angle: f64, expand: bool) -> RgbaImage {
    let (w, h) = (f64::from(src.width()), f64::from(src.height()));
    let (sin, cos) = angle.to_radians().sin_cos();
    let (out_w, out_h) = if expand {
        (
            bounding(w * cos.abs() + h * sin.abs()),
            bounding(w * sin.abs() + h * cos.abs()),
        )
    } else {
        (src.width(), src.height())
    };

    let (cx, cy) = (w / 2.0, h / 2.0);
    let (ocx, ocy) = (f64::from(out_w) / 2.0, f64::from(out_h) / 2.0);
    RgbaImage::from_fn(out_w, out_h, |ox, oy| {
        let dx = f64::from(ox) + 0.5 - ocx;
        let dy = f64::from(oy) + 0.5 - ocy;
        let sx = dx * cos - dy * sin + cx;
        let sy = dx * sin + dy * cos + cy;
        sample(src, sx - 0.5, sy - 0.5)
    })
}

fn bounding(extent: f64) -> u32 {
    (extent - 1e-9).ceil().max(1.0) as u32
}

fn sample(src: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let texel = |px: f64, py: f64| -> [f64; 4] {
        if px < 0.0 || py < 0.0 || px >= f64::from(src.width()) || py >= f64::from(src.height()) {
            return [0.0; 4];
        }
        let p = src.get_pixel(px as u32, py as u32).0;
        [p[0].into(), p[1].into(), p[2].into(), p[3].into()]
    };
    let corners = [
        (texel(x0, y0), (1.0 - fx) * (1.0 - fy)),
        (texel(x0 + 1.0, y0), fx * (1.0 - fy)),
        (texel(x0, y0 + 1.0), (1.0 - fx) * fy),
        (texel(x0 + 1.0, y0 + 1.0), fx * fy),
    ];
    let mut out = [0u8; 4];
    for (channel, value) in out.iter_mut().enumerate() {
        let v: f64 = corners.iter().map(|(t, weight)| t[channel] * weight).sum();
        *value = v.round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

#[cfg(test)]
#[path = "../../tests/unit/codecs/image.rs"]
mod tests;

use std::io::{Read, Write};

use anyhow::Context;
use image::{DynamicImage, RgbaImage};
use resvg::tiny_skia::{Pixmap, Transform as SkiaTransform};
use tracing::debug;

use crate::asset::Asset;
use crate::codecs::image::{ImageProcessor, format_for};
use crate::foundation::config::Config;
use crate::foundation::error::{MadamError, MadamResult};
use crate::foundation::mime::MimeType;
use crate::operator::{BoundOperator, Transform};
use crate::registry::{Processor, ReadSeek};

const SVG_MIME: &str = "image/svg+xml";
/// Bytes inspected when sniffing for an `<svg` root.
const PROBE_LEN: u64 = 4096;

/// Vector transforms supported by [`SvgProcessor`].
#[derive(Clone, Debug, PartialEq)]
pub enum SvgOp {
    /// Render to a raster format at the given pixel size.
    Rasterize {
        mime_type: MimeType,
        width: u32,
        height: u32,
    },
}

/// SVG codec: `usvg` for parsing, `resvg` for rendering.
#[derive(Clone, Debug, Default)]
pub struct SvgProcessor {
    raster: ImageProcessor,
}

impl SvgProcessor {
    pub fn new(config: Config) -> Self {
        Self {
            raster: ImageProcessor::new(config),
        }
    }

    pub fn rasterize(&self, mime_type: MimeType, width: u32, height: u32) -> BoundOperator<Self> {
        self.bind(SvgOp::Rasterize {
            mime_type,
            width,
            height,
        })
    }
}

fn parse(bytes: &[u8]) -> MadamResult<usvg::Tree> {
    let opts = usvg::Options::default();
    usvg::Tree::from_data(bytes, &opts)
        .map_err(|e| MadamError::unsupported(format!("malformed svg: {e}")))
}

fn svg_mime() -> MimeType {
    MimeType::known(SVG_MIME)
}

fn pixels(extent: f32) -> u32 {
    extent.round().max(1.0) as u32
}

impl Processor for SvgProcessor {
    fn name(&self) -> &'static str {
        "svg"
    }

    fn can_read(&self, stream: &mut dyn ReadSeek) -> bool {
        let mut head = Vec::new();
        if stream.take(PROBE_LEN).read_to_end(&mut head).is_err() {
            return false;
        }
        let text = String::from_utf8_lossy(&head);
        let text = text.trim_start_matches('\u{feff}').trim_start();
        text.starts_with('<') && text.contains("<svg")
    }

    fn read(&self, stream: &mut dyn ReadSeek) -> MadamResult<Asset> {
        let mut essence = Vec::new();
        stream.read_to_end(&mut essence).context("read svg stream")?;
        let size = parse(&essence)?.size();
        let (width, height) = (pixels(size.width()), pixels(size.height()));
        debug!(width, height, "read svg");
        Ok(Asset::new(essence, svg_mime())
            .with("width", width)
            .with("height", height))
    }

    fn can_write(&self, asset: &Asset) -> bool {
        asset.mime_type() == &svg_mime()
    }

    fn write(&self, asset: &Asset, out: &mut dyn Write) -> MadamResult<()> {
        out.write_all(asset.essence_bytes())
            .context("write svg essence")?;
        Ok(())
    }
}

impl Transform for SvgProcessor {
    type Op = SvgOp;

    #[tracing::instrument(skip(self, asset), fields(mime_type = %asset.mime_type()))]
    fn transform(&self, asset: Asset, op: &SvgOp) -> MadamResult<Asset> {
        let SvgOp::Rasterize {
            mime_type,
            width,
            height,
        } = op;
        if format_for(mime_type).is_none() {
            return Err(MadamError::unsupported(format!(
                "cannot rasterize svg to {mime_type}"
            )));
        }
        let tree = parse(asset.essence_bytes())
            .map_err(|e| MadamError::operator(format!("could not decode svg: {e}")))?;
        let mut pixmap = Pixmap::new(*width, *height).ok_or_else(|| {
            MadamError::operator(format!("invalid raster size {width}x{height}"))
        })?;

        let size = tree.size();
        let scale = SkiaTransform::from_scale(
            *width as f32 / size.width(),
            *height as f32 / size.height(),
        );
        resvg::render(&tree, scale, &mut pixmap.as_mut());

        let rgba: Vec<u8> = pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        let image = RgbaImage::from_raw(*width, *height, rgba)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| MadamError::operator("rendered buffer does not match raster size"))?;

        let essence = self.raster.encode(&image, mime_type)?;
        Ok(asset
            .derive(essence, mime_type.clone())
            .with("width", *width)
            .with("height", *height))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/codecs/vector.rs"]
mod tests;

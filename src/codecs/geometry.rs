use serde::{Deserialize, Serialize};

use crate::foundation::error::{MadamError, MadamResult};

/// How target dimensions are interpreted by resize transforms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    /// Use the target dimensions as given.
    #[default]
    Exact,
    /// Largest size that fits inside the target box, keeping the aspect ratio.
    Fit,
    /// Smallest size that covers the target box, keeping the aspect ratio.
    Fill,
}

/// Mirror axis for flip transforms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipOrientation {
    Horizontal,
    Vertical,
}

/// Output dimensions of resizing `(width, height)` into a `(target_w, target_h)` box.
///
/// Scaled sizes round half to even and never drop below one pixel.
pub fn resize_dimensions(
    (width, height): (u32, u32),
    (target_w, target_h): (u32, u32),
    mode: ResizeMode,
) -> MadamResult<(u32, u32)> {
    if target_w == 0 || target_h == 0 {
        return Err(MadamError::operator(format!(
            "invalid resize target {target_w}x{target_h}"
        )));
    }
    if width == 0 || height == 0 {
        return Err(MadamError::operator(format!(
            "cannot resize empty {width}x{height} content"
        )));
    }

    let (w, h) = (f64::from(width), f64::from(height));
    let aspect = w / h;
    let aspect_target = f64::from(target_w) / f64::from(target_h);
    let by_width = match mode {
        ResizeMode::Exact => return Ok((target_w, target_h)),
        ResizeMode::Fit => aspect >= aspect_target,
        ResizeMode::Fill => aspect <= aspect_target,
    };
    let scale = if by_width {
        f64::from(target_w) / w
    } else {
        f64::from(target_h) / h
    };
    Ok((scaled(scale * w), scaled(scale * h)))
}

fn scaled(v: f64) -> u32 {
    v.round_ties_even().clamp(1.0, f64::from(u32::MAX)) as u32
}

#[cfg(test)]
#[path = "../../tests/unit/codecs/geometry.rs"]
mod tests;

use anyhow::Result;
use image::RgbImage;
use std::borrow::Cow;

use super::geometry::ScaleFactors;
use super::resize::resize_image;

/// Image handed to the face detector, together with the factors that map
/// its coordinates back onto the original.
#[derive(Debug)]
pub struct Normalized<'a> {
    pub image: Cow<'a, RgbImage>,
    pub scale: ScaleFactors,
}

impl Normalized<'_> {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn was_downscaled(&self) -> bool {
        matches!(self.image, Cow::Owned(_))
    }
}

/// Dimensions of `(width, height)` once the shorter edge is capped at
/// `short_edge_max`. The longer edge is rounded to the nearest pixel.
/// Images already within the cap are returned untouched; nothing is upscaled.
pub fn detection_dimensions(width: u32, height: u32, short_edge_max: u32) -> (u32, u32) {
    let short = width.min(height);
    if short <= short_edge_max || short == 0 {
        return (width, height);
    }

    let ratio = short_edge_max as f64 / short as f64;
    if width < height {
        let new_height = (height as f64 * ratio).round() as u32;
        (short_edge_max, new_height.max(1))
    } else {
        let new_width = (width as f64 * ratio).round() as u32;
        (new_width.max(1), short_edge_max)
    }
}

/// Bound detector cost by shrinking large images before detection
pub fn normalize_for_detection(original: &RgbImage, short_edge_max: u32) -> Result<Normalized<'_>> {
    let (width, height) = original.dimensions();
    let (det_width, det_height) = detection_dimensions(width, height, short_edge_max);

    if (det_width, det_height) == (width, height) {
        return Ok(Normalized {
            image: Cow::Borrowed(original),
            scale: ScaleFactors::IDENTITY,
        });
    }

    let resized = resize_image(original, det_width, det_height)?;
    Ok(Normalized {
        image: Cow::Owned(resized),
        scale: ScaleFactors::between((width, height), (det_width, det_height)),
    })
}

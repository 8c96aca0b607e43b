use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::geometry::FaceBox;
use super::resize::resize_image;

/// Extract `face` from the original image.
///
/// The top-left corner is clamped to the image; the size is kept as is and
/// the region is simply truncated at the right and bottom edges. Returns
/// `None` when nothing of the box lies inside the image.
pub fn crop_region(original: &RgbImage, face: &FaceBox) -> Option<RgbImage> {
    let (img_width, img_height) = original.dimensions();
    if face.width <= 0 || face.height <= 0 {
        return None;
    }

    let x0 = face.x.max(0) as i64;
    let y0 = face.y.max(0) as i64;
    let x1 = (x0 + face.width as i64).min(img_width as i64);
    let y1 = (y0 + face.height as i64).min(img_height as i64);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    let crop = imageops::crop_imm(
        original,
        x0 as u32,
        y0 as u32,
        (x1 - x0) as u32,
        (y1 - y0) as u32,
    );
    Some(crop.to_image())
}

/// Output file names for the `index`-th face of a category
pub fn artifact_paths(category_dir: &Path, slug: &str, index: usize) -> (PathBuf, PathBuf) {
    (
        category_dir.join(format!("{}_{}_full.jpg", slug, index)),
        category_dir.join(format!("{}_{}_resized.jpg", slug, index)),
    )
}

/// Result of writing both artifacts of one face. The two writes are
/// independent: the resized image comes from the in-memory crop.
#[derive(Debug)]
pub struct PersistOutcome {
    pub full: Result<PathBuf>,
    pub resized: Result<PathBuf>,
}

impl PersistOutcome {
    pub fn is_saved(&self) -> bool {
        self.full.is_ok()
    }
}

/// Writes accepted face crops to disk
#[derive(Debug, Clone)]
pub struct FaceWriter {
    pub target_size: (u32, u32),
    pub full_quality: u8,
    pub resized_quality: u8,
    pub dry_run: bool,
}

impl Default for FaceWriter {
    fn default() -> Self {
        Self {
            target_size: (224, 224),
            full_quality: 95,
            resized_quality: 90,
            dry_run: false,
        }
    }
}

impl FaceWriter {
    pub fn persist(
        &self,
        category_dir: &Path,
        slug: &str,
        index: usize,
        crop: &RgbImage,
    ) -> PersistOutcome {
        let (full_path, resized_path) = artifact_paths(category_dir, slug, index);

        if self.dry_run {
            return PersistOutcome {
                full: Ok(full_path),
                resized: Ok(resized_path),
            };
        }

        let full = write_jpeg(crop, &full_path, self.full_quality).map(|_| full_path);

        let (target_width, target_height) = self.target_size;
        let resized = resize_image(crop, target_width, target_height)
            .and_then(|resized| write_jpeg(&resized, &resized_path, self.resized_quality))
            .map(|_| resized_path);

        PersistOutcome { full, resized }
    }
}

/// Encode an RGB image as JPEG at the given quality
pub fn write_jpeg(img: &RgbImage, path: &Path, quality: u8) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    {
        let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality);
        encoder
            .encode_image(img)
            .with_context(|| format!("Failed to encode JPEG {}", path.display()))?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

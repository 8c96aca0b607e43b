pub mod acceptance;
pub mod crop;
pub mod debug_overlay;
pub mod dedup;
pub mod detector;
pub mod external_detection;
pub mod geometry;
pub mod normalize;
#[cfg(feature = "ai")]
pub mod onnx_detection;
pub mod resize;

use anyhow::{Context, Result};
use image::RgbImage;

use acceptance::{check_frontal, check_size, FrontalThresholds, PoseSpace, Rejection};
use crop::crop_region;
use dedup::{ContentDigest, DedupLedger};
use detector::{FaceCandidate, FaceDetector};
use geometry::{FaceBox, ScaleFactors};
use normalize::normalize_for_detection;

/// Tunables of the face-acceptance pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum face width and height, in original-image pixels
    pub min_face_size: u32,
    /// Shorter-edge cap applied before detection
    pub detect_short_max: u32,
    pub frontal: FrontalThresholds,
    pub pose_space: PoseSpace,
    /// Hand the detection image back with each selection (debug overlays)
    pub keep_detection_image: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_face_size: 200,
            detect_short_max: 800,
            frontal: FrontalThresholds::default(),
            pose_space: PoseSpace::Detection,
            keep_detection_image: false,
        }
    }
}

/// The single face kept for a source image
#[derive(Debug, Clone)]
pub struct AcceptedFace {
    /// Position of the candidate in detector order
    pub candidate_index: usize,
    pub original_box: FaceBox,
    pub crop: RgbImage,
    pub digest: ContentDigest,
}

/// Everything the pipeline decided about one source image
#[derive(Debug)]
pub struct FaceSelection {
    pub candidates: Vec<FaceCandidate>,
    pub rejections: Vec<(usize, Rejection)>,
    pub accepted: Option<AcceptedFace>,
    pub scale: ScaleFactors,
    pub detection_image: Option<RgbImage>,
}

/// Decode downloaded bytes into an RGB raster
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory(bytes).context("Failed to decode image data")?;
    Ok(img.to_rgb8())
}

/// Normalize, detect, rescale and filter faces for one image at a time
pub struct FacePipeline<D> {
    detector: D,
    config: PipelineConfig,
}

impl<D: FaceDetector> FacePipeline<D> {
    pub fn new(detector: D, config: PipelineConfig) -> Self {
        Self { detector, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }

    /// Run detection on `original` and pick the face to keep.
    ///
    /// Candidates are examined in the order the detector returned them and
    /// the first one that passes size, pose and duplicate checks wins; the
    /// rest are not looked at. The winner's digest is recorded in `ledger`.
    /// Errors are limited to resizing and detector failures.
    pub fn select_face(
        &mut self,
        original: &RgbImage,
        ledger: &mut DedupLedger,
    ) -> Result<FaceSelection> {
        let normalized = normalize_for_detection(original, self.config.detect_short_max)?;
        let scale = normalized.scale;

        let candidates = self
            .detector
            .detect(&normalized.image)
            .with_context(|| format!("{} failed", self.detector.name()))?;

        let mut rejections = Vec::new();
        let mut accepted = None;

        for (idx, candidate) in candidates.iter().enumerate() {
            match self.evaluate(original, candidate, scale, ledger) {
                Ok((original_box, crop, digest)) => {
                    accepted = Some(AcceptedFace {
                        candidate_index: idx,
                        original_box,
                        crop,
                        digest,
                    });
                    break;
                }
                Err(rejection) => rejections.push((idx, rejection)),
            }
        }

        let detection_image = if self.config.keep_detection_image {
            Some(normalized.image.into_owned())
        } else {
            None
        };

        Ok(FaceSelection {
            candidates,
            rejections,
            accepted,
            scale,
            detection_image,
        })
    }

    fn evaluate(
        &self,
        original: &RgbImage,
        candidate: &FaceCandidate,
        scale: ScaleFactors,
        ledger: &mut DedupLedger,
    ) -> Result<(FaceBox, RgbImage, ContentDigest), Rejection> {
        let original_box = candidate.bounding_box.rescale(scale);
        check_size(&original_box, self.config.min_face_size)?;

        let pose_keypoints = match self.config.pose_space {
            PoseSpace::Detection => candidate.keypoints,
            PoseSpace::Original => candidate.keypoints.rescale(scale),
        };
        check_frontal(&pose_keypoints, &self.config.frontal)?;

        let crop = crop_region(original, &original_box).ok_or(Rejection::EmptyCrop)?;

        let digest = ContentDigest::of(crop.as_raw());
        if !ledger.insert(digest) {
            return Err(Rejection::Duplicate);
        }

        Ok((original_box, crop, digest))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::detector::{FaceCandidate, FaceDetector};
    use super::geometry::{FaceBox, Keypoints, Point};
    use anyhow::Result;
    use image::{ImageBuffer, Rgb, RgbImage};

    /// Gradient image whose content depends on `seed`
    pub fn seeded_image(width: u32, height: u32, seed: u8) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([
                (x % 256) as u8,
                (y % 256) as u8,
                seed.wrapping_add(((x + y) % 256) as u8),
            ])
        })
    }

    /// Frontal candidate with the given box, keypoints placed inside it
    pub fn frontal_candidate(x: i32, y: i32, width: i32, height: i32) -> FaceCandidate {
        let eye_y = (y + height / 3) as f32;
        let left_x = (x + width / 3) as f32;
        let right_x = (x + 2 * width / 3) as f32;
        FaceCandidate {
            bounding_box: FaceBox::new(x, y, width, height),
            keypoints: Keypoints::new(
                Point::new(left_x, eye_y),
                Point::new(right_x, eye_y + 1.0),
                Point::new((left_x + right_x) / 2.0, (y + height / 2) as f32),
            ),
            confidence: Some(0.99),
        }
    }

    /// Detector double returning a fixed answer and remembering what it saw
    pub struct FakeDetector {
        pub candidates: Vec<FaceCandidate>,
        pub seen_dimensions: Vec<(u32, u32)>,
        pub fail: bool,
    }

    impl FakeDetector {
        pub fn returning(candidates: Vec<FaceCandidate>) -> Self {
            Self {
                candidates,
                seen_dimensions: Vec::new(),
                fail: false,
            }
        }
    }

    impl FaceDetector for FakeDetector {
        fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceCandidate>> {
            self.seen_dimensions.push(image.dimensions());
            if self.fail {
                anyhow::bail!("detector exploded");
            }
            Ok(self.candidates.clone())
        }

        fn name(&self) -> &str {
            "fake detector"
        }
    }
}

use anyhow::Result;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::geometry::{FaceBox, Keypoints};

/// A face reported by a detector, in the coordinate space of the image the
/// detector was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceCandidate {
    #[serde(rename = "box")]
    pub bounding_box: FaceBox,
    pub keypoints: Keypoints,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Face detection capability consumed by the pipeline.
///
/// Candidates must be returned in the detector's own priority order: the
/// pipeline keeps the first acceptable one. `&mut self` keeps calls
/// serialized, detectors are not assumed to be reentrant.
pub trait FaceDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceCandidate>>;

    /// Short human readable name used in logs
    fn name(&self) -> &str {
        "face detector"
    }
}

impl<D: FaceDetector + ?Sized> FaceDetector for Box<D> {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceCandidate>> {
        (**self).detect(image)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use super::geometry::{FaceBox, Keypoints};

/// Coordinate space the frontal-pose test reads keypoints from.
///
/// `Detection` reproduces the historical behavior: pixel thresholds are
/// applied to the keypoints exactly as the detector emitted them, so the
/// effective strictness depends on how much the source was downscaled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoseSpace {
    #[default]
    #[value(name = "detection")]
    Detection,
    #[value(name = "original")]
    Original,
}

/// Pixel thresholds for the frontal heuristic (both bounds are exclusive)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrontalThresholds {
    pub max_eye_diff: f32,
    pub max_center_offset: f32,
}

impl Default for FrontalThresholds {
    fn default() -> Self {
        Self {
            max_eye_diff: 15.0,
            max_center_offset: 20.0,
        }
    }
}

/// Why a single face candidate was not kept
#[derive(Debug, Clone, PartialEq, Display)]
pub enum Rejection {
    #[strum(to_string = "face too small (w={width}, h={height})")]
    FaceTooSmall { width: i32, height: i32 },
    #[strum(to_string = "not frontal (eye diff {eye_diff}, nose offset {center_offset})")]
    NotFrontal { eye_diff: f32, center_offset: f32 },
    #[strum(to_string = "crop region is empty")]
    EmptyCrop,
    #[strum(to_string = "duplicate face")]
    Duplicate,
}

/// Measurements behind the frontal decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseMeasure {
    pub eye_diff: f32,
    pub center_offset: f32,
}

impl PoseMeasure {
    pub fn of(keypoints: &Keypoints) -> Self {
        let eye_diff = (keypoints.left_eye.y - keypoints.right_eye.y).abs();
        let eye_center_x = (keypoints.left_eye.x + keypoints.right_eye.x) / 2.0;
        let center_offset = (keypoints.nose.x - eye_center_x).abs();
        Self {
            eye_diff,
            center_offset,
        }
    }

    pub fn is_frontal(&self, thresholds: &FrontalThresholds) -> bool {
        self.eye_diff < thresholds.max_eye_diff && self.center_offset < thresholds.max_center_offset
    }
}

/// Size stage: both sides of the original-space box must reach `min_face_size`
pub fn check_size(original_box: &FaceBox, min_face_size: u32) -> Result<(), Rejection> {
    let min = min_face_size.min(i32::MAX as u32) as i32;
    if original_box.width < min || original_box.height < min {
        return Err(Rejection::FaceTooSmall {
            width: original_box.width,
            height: original_box.height,
        });
    }
    Ok(())
}

/// Pose stage: roll is approximated by the eye height difference, yaw by the
/// horizontal distance between the nose and the midpoint of the eyes.
pub fn check_frontal(keypoints: &Keypoints, thresholds: &FrontalThresholds) -> Result<(), Rejection> {
    let measure = PoseMeasure::of(keypoints);
    if measure.is_frontal(thresholds) {
        Ok(())
    } else {
        Err(Rejection::NotFrontal {
            eye_diff: measure.eye_diff,
            center_offset: measure.center_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processing::geometry::Point;

    fn keypoints(nose_x: f32) -> Keypoints {
        Keypoints::new(
            Point::new(100.0, 100.0),
            Point::new(140.0, 102.0),
            Point::new(nose_x, 115.0),
        )
    }

    #[test]
    fn test_size_rejects_narrow_face() {
        let result = check_size(&FaceBox::new(0, 0, 150, 400), 200);
        assert_eq!(
            result,
            Err(Rejection::FaceTooSmall {
                width: 150,
                height: 400
            })
        );
    }

    #[test]
    fn test_size_rejects_short_face() {
        assert!(check_size(&FaceBox::new(0, 0, 300, 199), 200).is_err());
    }

    #[test]
    fn test_size_accepts_at_threshold() {
        assert!(check_size(&FaceBox::new(-10, -10, 200, 200), 200).is_ok());
    }

    #[test]
    fn test_frontal_acceptance() {
        let measure = PoseMeasure::of(&keypoints(120.0));
        assert_eq!(measure.eye_diff, 2.0);
        assert_eq!(measure.center_offset, 0.0);
        assert!(check_frontal(&keypoints(120.0), &FrontalThresholds::default()).is_ok());
    }

    #[test]
    fn test_frontal_rejection_on_nose_offset() {
        let result = check_frontal(&keypoints(150.0), &FrontalThresholds::default());
        assert_eq!(
            result,
            Err(Rejection::NotFrontal {
                eye_diff: 2.0,
                center_offset: 30.0
            })
        );
    }

    #[test]
    fn test_frontal_thresholds_are_exclusive() {
        let tilted = Keypoints::new(
            Point::new(100.0, 100.0),
            Point::new(140.0, 115.0),
            Point::new(120.0, 130.0),
        );
        assert!(check_frontal(&tilted, &FrontalThresholds::default()).is_err());

        let turned = keypoints(140.0);
        assert!(check_frontal(&turned, &FrontalThresholds::default()).is_err());
        let relaxed = FrontalThresholds {
            max_eye_diff: 15.0,
            max_center_offset: 20.5,
        };
        assert!(check_frontal(&turned, &relaxed).is_ok());
    }

    #[test]
    fn test_rejection_display() {
        let rejection = Rejection::FaceTooSmall {
            width: 150,
            height: 180,
        };
        assert_eq!(rejection.to_string(), "face too small (w=150, h=180)");
        assert_eq!(Rejection::Duplicate.to_string(), "duplicate face");
    }
}

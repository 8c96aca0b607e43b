/// Native face detection with a YuNet-style ONNX model.
///
/// The model must expose post-processed rows of 15 values
/// (`x, y, w, h`, five landmark pairs, score) as `[N, 15]` or `[1, N, 15]`.
use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::RgbImage;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::cmp::Ordering;
use std::path::Path;

use super::detector::{FaceCandidate, FaceDetector};
use super::geometry::{FaceBox, Keypoints, Point};

const ROW_LEN: usize = 15;

/// Decoded row before conversion to a candidate (model input coordinates)
#[derive(Debug, Clone)]
struct RawDetection {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    landmarks: [(f32, f32); 5],
    score: f32,
}

impl RawDetection {
    fn iou(&self, other: &RawDetection) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        if intersection <= 0.0 {
            return 0.0;
        }

        let union = self.width * self.height + other.width * other.height - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// Map into detection-image coordinates. Landmark order follows the
    /// model: subject's right eye first, which is the image-left eye.
    fn into_candidate(self, scale_x: f32, scale_y: f32) -> FaceCandidate {
        let point = |(x, y): (f32, f32)| Point::new(x * scale_x, y * scale_y);
        FaceCandidate {
            bounding_box: FaceBox::new(
                (self.x * scale_x).round() as i32,
                (self.y * scale_y).round() as i32,
                (self.width * scale_x).round() as i32,
                (self.height * scale_y).round() as i32,
            ),
            keypoints: Keypoints {
                left_eye: point(self.landmarks[0]),
                right_eye: point(self.landmarks[1]),
                nose: point(self.landmarks[2]),
                mouth_left: Some(point(self.landmarks[3])),
                mouth_right: Some(point(self.landmarks[4])),
            },
            confidence: Some(self.score),
        }
    }
}

/// Score filter, sort by confidence and non-maximum suppression
fn decode_rows(
    shape: &[usize],
    data: &[f32],
    score_threshold: f32,
    nms_threshold: f32,
) -> Result<Vec<RawDetection>> {
    let rows = match shape {
        [rows, ROW_LEN] => *rows,
        [1, rows, ROW_LEN] => *rows,
        other => anyhow::bail!(
            "Face model output must have shape [N, 15] or [1, N, 15] (got {:?})",
            other
        ),
    };
    anyhow::ensure!(
        data.len() >= rows * ROW_LEN,
        "Face model output is truncated"
    );

    let mut detections: Vec<RawDetection> = data
        .chunks_exact(ROW_LEN)
        .take(rows)
        .filter(|row| row[14].is_finite() && row[14] >= score_threshold)
        .filter(|row| row[2] > 0.0 && row[3] > 0.0)
        .map(|row| RawDetection {
            x: row[0],
            y: row[1],
            width: row[2],
            height: row[3],
            landmarks: [
                (row[4], row[5]),
                (row[6], row[7]),
                (row[8], row[9]),
                (row[10], row[11]),
                (row[12], row[13]),
            ],
            score: row[14],
        })
        .collect();

    detections.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut kept: Vec<RawDetection> = Vec::with_capacity(detections.len());
    for detection in detections {
        if kept.iter().all(|k| detection.iou(k) <= nms_threshold) {
            kept.push(detection);
        }
    }
    Ok(kept)
}

/// Pack an RGB image as a BGR NCHW float tensor (0-255 range)
fn prepare_tensor(img: &RgbImage) -> Vec<f32> {
    let (width, height) = img.dimensions();
    let plane = (width * height) as usize;
    let mut tensor = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in img.enumerate_pixels() {
        let idx = (y * width + x) as usize;
        tensor[idx] = pixel[2] as f32;
        tensor[plane + idx] = pixel[1] as f32;
        tensor[2 * plane + idx] = pixel[0] as f32;
    }
    tensor
}

/// ONNX Runtime face detector
pub struct OnnxFaceDetector {
    session: Session,
    input_size: (u32, u32),
    score_threshold: f32,
    nms_threshold: f32,
}

impl OnnxFaceDetector {
    pub fn new(model_path: &Path, input_size: (u32, u32), score_threshold: f32) -> Result<Self> {
        if !model_path.exists() {
            anyhow::bail!("Face model not found: {}", model_path.display());
        }

        let session = Session::builder()
            .map_err(|e| anyhow::anyhow!("Failed to create ONNX session: {e}"))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| anyhow::anyhow!("Failed to set optimization level: {e}"))?
            .commit_from_file(model_path)
            .map_err(|e| anyhow::anyhow!("Failed to load {}: {e}", model_path.display()))?;

        Ok(Self {
            session,
            input_size,
            score_threshold,
            nms_threshold: 0.3,
        })
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceCandidate>> {
        let (in_w, in_h) = self.input_size;
        let (img_w, img_h) = image.dimensions();
        let resized = image::imageops::resize(image, in_w, in_h, FilterType::Triangle);

        let input_shape = vec![1usize, 3, in_h as usize, in_w as usize];
        let input_value = Value::from_array((input_shape, prepare_tensor(&resized)))
            .context("Failed to build input tensor")?;

        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(|e| anyhow::anyhow!("Face model inference failed: {e}"))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| anyhow::anyhow!("Unexpected face model output: {e}"))?;
        let shape: Vec<usize> = shape.iter().map(|&d| d as usize).collect();

        let detections = decode_rows(&shape, data, self.score_threshold, self.nms_threshold)?;

        let scale_x = img_w as f32 / in_w as f32;
        let scale_y = img_h as f32 / in_h as f32;
        Ok(detections
            .into_iter()
            .map(|d| d.into_candidate(scale_x, scale_y))
            .collect())
    }

    fn name(&self) -> &str {
        "onnx face detector"
    }
}

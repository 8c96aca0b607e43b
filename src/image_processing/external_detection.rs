use anyhow::{Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::detector::{FaceCandidate, FaceDetector};
use super::geometry::{FaceBox, Keypoints, Point};
use crate::utils::verbose_println;

// JSON emitted by the detection script (one record per face, MTCNN layout)
mod script_output {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct RawKeypoints {
        pub left_eye: [f32; 2],
        pub right_eye: [f32; 2],
        pub nose: [f32; 2],
        #[serde(default)]
        pub mouth_left: Option<[f32; 2]>,
        #[serde(default)]
        pub mouth_right: Option<[f32; 2]>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct RawFace {
        #[serde(rename = "box")]
        pub bounding_box: [f32; 4], // [x, y, width, height]
        #[serde(default)]
        pub confidence: Option<f32>,
        pub keypoints: RawKeypoints,
    }

    /// Either a bare list of faces or a report object carrying an error
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(untagged)]
    pub enum ScriptOutput {
        Faces(Vec<RawFace>),
        Report {
            #[serde(default)]
            faces: Vec<RawFace>,
            #[serde(default)]
            error: Option<String>,
        },
    }
}

use script_output::{RawFace, ScriptOutput};

impl From<RawFace> for FaceCandidate {
    fn from(raw: RawFace) -> Self {
        let [x, y, w, h] = raw.bounding_box;
        let point = |p: [f32; 2]| Point::new(p[0], p[1]);
        FaceCandidate {
            bounding_box: FaceBox::new(
                x.round() as i32,
                y.round() as i32,
                w.round() as i32,
                h.round() as i32,
            ),
            keypoints: Keypoints {
                left_eye: point(raw.keypoints.left_eye),
                right_eye: point(raw.keypoints.right_eye),
                nose: point(raw.keypoints.nose),
                mouth_left: raw.keypoints.mouth_left.map(point),
                mouth_right: raw.keypoints.mouth_right.map(point),
            },
            confidence: raw.confidence,
        }
    }
}

/// Parse the detection script's stdout into candidates, keeping its order
pub fn parse_script_output(stdout: &str) -> Result<Vec<FaceCandidate>> {
    let output: ScriptOutput = serde_json::from_str(stdout.trim())
        .with_context(|| format!("Failed to parse detector output: {}", stdout.trim()))?;

    let faces = match output {
        ScriptOutput::Faces(faces) => faces,
        ScriptOutput::Report {
            error: Some(error), ..
        } => anyhow::bail!("Detector script reported an error: {}", error),
        ScriptOutput::Report { faces, .. } => faces,
    };

    Ok(faces.into_iter().map(FaceCandidate::from).collect())
}

/// Face detector backed by an external script.
///
/// The image is written to a temporary PNG and the script is invoked as
/// `<interpreter> <script> --image <path>`; it must print a JSON array of
/// `{"box": [x, y, w, h], "confidence": c, "keypoints": {...}}` records.
pub struct ExternalFaceDetector {
    interpreter: String,
    script_path: PathBuf,
    temp_path: PathBuf,
    verbose: bool,
}

impl ExternalFaceDetector {
    pub fn new(interpreter: &str, script_path: &Path, verbose: bool) -> Result<Self> {
        if !script_path.exists() {
            anyhow::bail!("Face detector script not found: {}", script_path.display());
        }

        let temp_path =
            std::env::temp_dir().join(format!("facecrawl_detect_{}.png", std::process::id()));

        Ok(Self {
            interpreter: interpreter.to_string(),
            script_path: script_path.to_path_buf(),
            temp_path,
            verbose,
        })
    }

    fn run_script(&self) -> Result<String> {
        let output = Command::new(&self.interpreter)
            .arg(&self.script_path)
            .arg("--image")
            .arg(&self.temp_path)
            .output()
            .with_context(|| {
                format!(
                    "Failed to execute {} {}",
                    self.interpreter,
                    self.script_path.display()
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Detector script failed ({}): {}", output.status, stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl FaceDetector for ExternalFaceDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceCandidate>> {
        image
            .save(&self.temp_path)
            .with_context(|| format!("Failed to write {}", self.temp_path.display()))?;

        let stdout = self.run_script();
        if let Err(e) = std::fs::remove_file(&self.temp_path) {
            verbose_println(
                self.verbose,
                &format!(
                    "Could not remove temporary image {}: {}",
                    self.temp_path.display(),
                    e
                ),
            );
        }
        let candidates = parse_script_output(&stdout?)?;

        verbose_println(
            self.verbose,
            &format!("{} returned {} face(s)", self.name(), candidates.len()),
        );
        Ok(candidates)
    }

    fn name(&self) -> &str {
        "external face detector"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MTCNN_OUTPUT: &str = r#"[
        {"box": [277, 90, 48, 63], "confidence": 0.9985,
         "keypoints": {"left_eye": [291, 117], "right_eye": [314, 114], "nose": [303, 131],
                       "mouth_left": [296, 143], "mouth_right": [313, 141]}},
        {"box": [-3.4, 12.6, 20, 22], "keypoints":
            {"left_eye": [1.5, 20], "right_eye": [9, 20], "nose": [5, 25]}}
    ]"#;

    #[test]
    fn test_parse_mtcnn_records() {
        let candidates = parse_script_output(MTCNN_OUTPUT).unwrap();
        assert_eq!(candidates.len(), 2);

        let first = &candidates[0];
        assert_eq!(first.bounding_box, FaceBox::new(277, 90, 48, 63));
        assert_eq!(first.keypoints.left_eye, Point::new(291.0, 117.0));
        assert_eq!(first.keypoints.mouth_right, Some(Point::new(313.0, 141.0)));
        assert_eq!(first.confidence, Some(0.9985));

        let second = &candidates[1];
        assert_eq!(second.bounding_box, FaceBox::new(-3, 13, 20, 22));
        assert_eq!(second.keypoints.mouth_left, None);
        assert_eq!(second.confidence, None);
    }

    #[test]
    fn test_parse_empty_and_report_forms() {
        assert!(parse_script_output("[]").unwrap().is_empty());
        assert!(parse_script_output(r#"{"faces": []}"#).unwrap().is_empty());

        let err = parse_script_output(r#"{"faces": [], "error": "model missing"}"#).unwrap_err();
        assert!(err.to_string().contains("model missing"));
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(parse_script_output("Traceback (most recent call last)").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_detect_tolerates_missing_temp_image() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("detect.sh");
        // the script deletes the image it was given before answering
        std::fs::write(
            &script,
            "rm -f \"$2\"\necho '[{\"box\": [1, 2, 3, 4], \"keypoints\": {\"left_eye\": [1, 1], \"right_eye\": [2, 1], \"nose\": [1.5, 2]}}]'\n",
        )
        .unwrap();

        let mut detector = ExternalFaceDetector::new("sh", &script, true).unwrap();
        let candidates = detector.detect(&RgbImage::new(8, 8)).unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].bounding_box, FaceBox::new(1, 2, 3, 4));
        assert!(!detector.temp_path.exists());
    }

    #[test]
    fn test_missing_script_is_rejected() {
        let result = ExternalFaceDetector::new("python3", Path::new("/nonexistent/detect.py"), false);
        assert!(result.is_err());
    }
}

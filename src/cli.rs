use clap::Parser;
use std::path::PathBuf;

use crate::crawl::Category;
use crate::image_processing::acceptance::{FrontalThresholds, PoseSpace};
use crate::image_processing::crop::FaceWriter;
use crate::image_processing::PipelineConfig;

/// Queries crawled when no `--category` is given
pub const DEFAULT_CATEGORIES: [&str; 5] = [
    "Korean K-pop idol profile picture",
    "African actor profile picture",
    "Eurpiean actress profile picture",
    "Hispanic actress profile picture",
    "American model profile picture",
];

pub const DEFAULT_OUTPUT_DIR: &str = "dataset_bing_highres_frontal";
pub const DEFAULT_EXTENSIONS: &str = "jpg,jpeg,png,webp,tiff,bmp";

#[derive(Parser, Debug)]
#[command(
    name = "facecrawl",
    version,
    about = "Collects frontal, high-resolution face crops from image search results",
    long_about = "
facecrawl - Face Dataset Collector

For every category query, facecrawl fetches the first page of image search
results, downloads each image, detects faces on a downscaled copy and keeps
the first face that is large enough, looks straight at the camera and has
not been saved before. Each kept face is written twice: the full-resolution
crop and a fixed-size copy for model training.

Example Usage:
  # Crawl the built-in categories with an MTCNN helper script
  facecrawl --detector-script ./scripts/mtcnn_detect.py

  # Two custom categories, 30 faces each, 160x160 training copies
  facecrawl -c \"smiling chef portrait\" -c \"astronaut portrait\" -q 30 -s 160x160 \\
    --detector-script ./scripts/mtcnn_detect.py -o ~/datasets/faces

  # Offline run over a local folder (one subfolder per category slug)
  facecrawl -i ~/Pictures/sources -c \"family\" --detector-script ./scripts/mtcnn_detect.py

  # Native ONNX detector (build with --features ai)
  facecrawl --model ./models/face_detection_yunet.onnx --report

  # Simulate without writing anything
  facecrawl --detector-script ./scripts/mtcnn_detect.py --dry-run --verbose"
)]
pub struct Args {
    /// Category query (can be specified multiple times; defaults to five built-in queries)
    #[arg(short = 'c', long = "category", value_name = "QUERY")]
    pub categories: Vec<String>,

    /// Dataset root; each category gets its own subfolder
    #[arg(
        short = 'o',
        long = "output",
        value_name = "DIR",
        default_value = DEFAULT_OUTPUT_DIR
    )]
    pub output_dir: PathBuf,

    /// Faces to collect per category
    #[arg(short = 'q', long = "quota", default_value = "15", value_name = "N")]
    pub quota: usize,

    /// Minimum face width and height in original-image pixels
    #[arg(long = "min-face-size", default_value = "200", value_name = "PX")]
    pub min_face_size: u32,

    /// Size of the normalized copy (format: WIDTHxHEIGHT)
    #[arg(
        short = 's',
        long = "size",
        default_value = "224x224",
        value_name = "WIDTHxHEIGHT"
    )]
    pub size: String,

    /// Shorter-edge cap of the image handed to the detector
    #[arg(long = "detect-short-max", default_value = "800", value_name = "PX")]
    pub detect_short_max: u32,

    /// Coordinate space of the keypoints used by the frontal test
    #[arg(long = "pose-space", value_enum, default_value = "detection")]
    pub pose_space: PoseSpace,

    /// Maximum vertical distance between the eyes (exclusive)
    #[arg(long = "max-eye-diff", default_value = "15", value_name = "PX")]
    pub max_eye_diff: f32,

    /// Maximum horizontal nose offset from the eye midpoint (exclusive)
    #[arg(long = "max-center-offset", default_value = "20", value_name = "PX")]
    pub max_center_offset: f32,

    /// JPEG quality of the full-resolution crop
    #[arg(long = "full-quality", default_value = "95", value_name = "1-100")]
    pub full_quality: u8,

    /// JPEG quality of the normalized copy
    #[arg(long = "resized-quality", default_value = "90", value_name = "1-100")]
    pub resized_quality: u8,

    /// Face detection script printing MTCNN-style JSON for `--image <path>`
    #[arg(long = "detector-script", value_name = "FILE")]
    pub detector_script: Option<PathBuf>,

    /// Interpreter used to run the detection script
    #[arg(long = "python", default_value = "python3", value_name = "BIN")]
    pub python: String,

    /// YuNet-style ONNX face model (requires the `ai` feature)
    #[arg(long = "model", value_name = "FILE")]
    pub model: Option<PathBuf>,

    /// Score threshold for the ONNX detector (0.0-1.0)
    #[arg(long = "confidence", default_value = "0.9", value_name = "THRESHOLD")]
    pub confidence_threshold: f32,

    /// Read sources from a local directory instead of the web
    #[arg(short = 'i', long = "input", value_name = "DIR")]
    pub input_path: Option<PathBuf>,

    /// Comma-separated list of image extensions accepted from --input
    #[arg(long = "extensions", default_value = DEFAULT_EXTENSIONS)]
    pub extensions_str: String,

    /// Network timeout in seconds for search and download requests
    #[arg(long = "timeout", default_value = "10", value_name = "SECS")]
    pub timeout_secs: u64,

    /// Load settings from a JSON configuration file (command-line flags win)
    #[arg(long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Run the whole pipeline but write no files
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Also write the detection image with candidate boxes for every saved face
    #[arg(long = "debug")]
    pub debug: bool,

    /// Print a per-category table at the end
    #[arg(long = "report")]
    pub report: bool,

    /// Emit JSON lines instead of human-readable output
    #[arg(long = "json-progress")]
    pub json_progress: bool,

    /// Enable verbose output with per-candidate details
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Args {
    /// Parse the size string into width and height
    pub fn parse_size(&self) -> Result<(u32, u32), String> {
        parse_size(&self.size)
    }

    /// Parse the extensions string into a vector
    pub fn parse_extensions(&self) -> Vec<String> {
        self.extensions_str
            .split(',')
            .map(|s| s.trim().trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Categories to crawl, in command-line order
    pub fn categories(&self) -> Vec<Category> {
        if self.categories.is_empty() {
            DEFAULT_CATEGORIES
                .iter()
                .map(|query| Category::new(*query, self.quota))
                .collect()
        } else {
            self.categories
                .iter()
                .map(|query| Category::new(query.trim(), self.quota))
                .collect()
        }
    }

    pub fn uses_onnx_detector(&self) -> bool {
        cfg!(feature = "ai") && self.model.is_some()
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            min_face_size: self.min_face_size,
            detect_short_max: self.detect_short_max,
            frontal: FrontalThresholds {
                max_eye_diff: self.max_eye_diff,
                max_center_offset: self.max_center_offset,
            },
            pose_space: self.pose_space,
            keep_detection_image: self.debug,
        }
    }

    pub fn face_writer(&self) -> Result<FaceWriter, String> {
        Ok(FaceWriter {
            target_size: self.parse_size()?,
            full_quality: self.full_quality,
            resized_quality: self.resized_quality,
            dry_run: self.dry_run,
        })
    }
}

/// Parse `WIDTHxHEIGHT`
pub fn parse_size(size: &str) -> Result<(u32, u32), String> {
    let parts: Vec<&str> = size.trim().split(['x', 'X']).collect();
    if parts.len() != 2 {
        return Err(format!(
            "Invalid size format '{}'. Use WIDTHxHEIGHT (e.g., 224x224)",
            size
        ));
    }

    let width = parts[0]
        .parse::<u32>()
        .map_err(|_| format!("Invalid width: '{}'", parts[0]))?;
    let height = parts[1]
        .parse::<u32>()
        .map_err(|_| format!("Invalid height: '{}'", parts[1]))?;

    if width == 0 || height == 0 {
        return Err("Width and height must be greater than 0".to_string());
    }

    if width > 4096 || height > 4096 {
        return Err("Width and height must be at most 4096 pixels".to_string());
    }

    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("224x224").unwrap(), (224, 224));
        assert_eq!(parse_size("160X120").unwrap(), (160, 120));
        assert!(parse_size("224").is_err());
        assert!(parse_size("0x224").is_err());
        assert!(parse_size("axb").is_err());
        assert!(parse_size("5000x10").is_err());
    }

    #[test]
    fn test_defaults_from_command_line() {
        let args = Args::try_parse_from(["facecrawl"]).unwrap();
        assert_eq!(args.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(args.quota, 15);
        assert_eq!(args.min_face_size, 200);
        assert_eq!(args.detect_short_max, 800);
        assert_eq!(args.pose_space, PoseSpace::Detection);
        assert_eq!(args.parse_size().unwrap(), (224, 224));
        assert_eq!(args.full_quality, 95);
        assert_eq!(args.resized_quality, 90);

        let categories = args.categories();
        assert_eq!(categories.len(), 5);
        assert_eq!(categories[0].query, "Korean K-pop idol profile picture");
        assert!(categories.iter().all(|c| c.quota == 15));
    }

    #[test]
    fn test_categories_and_overrides() {
        let args = Args::try_parse_from([
            "facecrawl",
            "-c",
            "chefs",
            "--category",
            "astronauts",
            "-q",
            "3",
            "--pose-space",
            "original",
            "--debug",
        ])
        .unwrap();

        let categories = args.categories();
        assert_eq!(
            categories,
            vec![Category::new("chefs", 3), Category::new("astronauts", 3)]
        );

        let pipeline = args.pipeline_config();
        assert_eq!(pipeline.pose_space, PoseSpace::Original);
        assert!(pipeline.keep_detection_image);
    }

    #[test]
    fn test_parse_extensions() {
        let args = Args {
            extensions_str: "JPG, .png , webp,".to_string(),
            ..Default::default()
        };
        assert_eq!(args.parse_extensions(), vec!["jpg", "png", "webp"]);
    }

    #[test]
    fn test_face_writer_follows_flags() {
        let args = Args {
            size: "112x96".to_string(),
            dry_run: true,
            ..Default::default()
        };
        let writer = args.face_writer().unwrap();
        assert_eq!(writer.target_size, (112, 96));
        assert!(writer.dry_run);
    }
}

// Default implementation for tests
#[cfg(test)]
impl Default for Args {
    fn default() -> Self {
        Self {
            categories: vec![],
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            quota: 15,
            min_face_size: 200,
            size: "224x224".to_string(),
            detect_short_max: 800,
            pose_space: PoseSpace::Detection,
            max_eye_diff: 15.0,
            max_center_offset: 20.0,
            full_quality: 95,
            resized_quality: 90,
            detector_script: None,
            python: "python3".to_string(),
            model: None,
            confidence_threshold: 0.9,
            input_path: None,
            extensions_str: DEFAULT_EXTENSIONS.to_string(),
            timeout_secs: 10,
            config_file: None,
            dry_run: false,
            debug: false,
            report: false,
            json_progress: false,
            verbose: false,
        }
    }
}

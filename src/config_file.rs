use crate::cli::Args;
use crate::image_processing::acceptance::PoseSpace;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Saved crawl profile
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub name: Option<String>,
    pub config: CrawlConfigJson,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlConfigJson {
    pub categories: Option<Vec<String>>,
    pub quota: Option<usize>,
    pub output_path: Option<String>,
    pub input_path: Option<String>,
    pub min_face_size: Option<u32>,
    pub target_size: Option<String>,
    pub detect_short_max: Option<u32>,
    pub pose_space: Option<PoseSpace>,
    pub max_eye_diff: Option<f32>,
    pub max_center_offset: Option<f32>,
    pub full_quality: Option<u8>,
    pub resized_quality: Option<u8>,
    pub detector_script: Option<String>,
    pub python: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub dry_run: Option<bool>,
    pub debug: Option<bool>,
    pub report: Option<bool>,
}

/// True when any of `flags` appears on the command line, as `--flag value`
/// or `--flag=value`
fn given(cli_args: &[String], flags: &[&str]) -> bool {
    cli_args.iter().any(|arg| {
        flags.iter().any(|flag| {
            arg == flag
                || (flag.starts_with("--") && arg.starts_with(&format!("{}=", flag)))
                || (!flag.starts_with("--") && arg.starts_with(flag) && arg.len() > flag.len())
        })
    })
}

impl Args {
    /// Load configuration from a JSON file and merge with command-line arguments
    /// Command-line arguments take precedence over config file values
    pub fn load_and_merge_config(&mut self) -> Result<Option<String>> {
        let cli_args: Vec<String> = std::env::args().skip(1).collect();
        self.load_and_merge_config_with(&cli_args)
    }

    /// Same as `load_and_merge_config` with an explicit command line
    pub fn load_and_merge_config_with(&mut self, cli_args: &[String]) -> Result<Option<String>> {
        let Some(config_path) = self.config_file.clone() else {
            return Ok(None);
        };

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: ConfigFile = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        self.merge_from_config(config.config, cli_args);

        Ok(Some(
            config
                .name
                .unwrap_or_else(|| config_path.display().to_string()),
        ))
    }

    pub fn merge_from_config(&mut self, config: CrawlConfigJson, cli_args: &[String]) {
        if !given(cli_args, &["-c", "--category"]) {
            if let Some(categories) = config.categories {
                self.categories = categories;
            }
        }

        if !given(cli_args, &["-q", "--quota"]) {
            if let Some(quota) = config.quota {
                self.quota = quota;
            }
        }

        if !given(cli_args, &["-o", "--output"]) {
            if let Some(output) = config.output_path {
                self.output_dir = PathBuf::from(output);
            }
        }

        if !given(cli_args, &["-i", "--input"]) {
            if let Some(input) = config.input_path {
                self.input_path = Some(PathBuf::from(input));
            }
        }

        if !given(cli_args, &["--min-face-size"]) {
            if let Some(size) = config.min_face_size {
                self.min_face_size = size;
            }
        }

        if !given(cli_args, &["-s", "--size"]) {
            if let Some(size) = config.target_size {
                self.size = size;
            }
        }

        if !given(cli_args, &["--detect-short-max"]) {
            if let Some(cap) = config.detect_short_max {
                self.detect_short_max = cap;
            }
        }

        if !given(cli_args, &["--pose-space"]) {
            if let Some(space) = config.pose_space {
                self.pose_space = space;
            }
        }

        if !given(cli_args, &["--max-eye-diff"]) {
            if let Some(diff) = config.max_eye_diff {
                self.max_eye_diff = diff;
            }
        }

        if !given(cli_args, &["--max-center-offset"]) {
            if let Some(offset) = config.max_center_offset {
                self.max_center_offset = offset;
            }
        }

        if !given(cli_args, &["--full-quality"]) {
            if let Some(quality) = config.full_quality {
                self.full_quality = quality;
            }
        }

        if !given(cli_args, &["--resized-quality"]) {
            if let Some(quality) = config.resized_quality {
                self.resized_quality = quality;
            }
        }

        if self.detector_script.is_none() {
            self.detector_script = config.detector_script.map(PathBuf::from);
        }

        if !given(cli_args, &["--python"]) {
            if let Some(python) = config.python {
                self.python = python;
            }
        }

        if self.model.is_none() {
            self.model = config.model.map(PathBuf::from);
        }

        if !given(cli_args, &["--timeout"]) {
            if let Some(timeout) = config.timeout_secs {
                self.timeout_secs = timeout;
            }
        }

        // Boolean flags - only apply if currently false (default)
        if !self.dry_run {
            self.dry_run = config.dry_run.unwrap_or(false);
        }

        if !self.debug {
            self.debug = config.debug.unwrap_or(false);
        }

        if !self.report {
            self.report = config.report.unwrap_or(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: &str = r#"{
        "name": "celebrities",
        "config": {
            "categories": ["red carpet actor", "news anchor"],
            "quota": 40,
            "outputPath": "/data/faces",
            "targetSize": "160x160",
            "poseSpace": "original",
            "maxEyeDiff": 10.5,
            "detectorScript": "scripts/mtcnn_detect.py",
            "report": true
        }
    }"#;

    fn cli(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_config_values_fill_defaults() {
        let config: ConfigFile = serde_json::from_str(PROFILE).unwrap();
        assert_eq!(config.name.as_deref(), Some("celebrities"));

        let mut args = Args::default();
        args.merge_from_config(config.config, &[]);

        assert_eq!(args.categories, vec!["red carpet actor", "news anchor"]);
        assert_eq!(args.quota, 40);
        assert_eq!(args.output_dir, PathBuf::from("/data/faces"));
        assert_eq!(args.parse_size().unwrap(), (160, 160));
        assert_eq!(args.pose_space, PoseSpace::Original);
        assert_eq!(args.max_eye_diff, 10.5);
        assert_eq!(
            args.detector_script,
            Some(PathBuf::from("scripts/mtcnn_detect.py"))
        );
        assert!(args.report);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_explicit_flags_win() {
        let config: ConfigFile = serde_json::from_str(PROFILE).unwrap();
        let mut args = Args {
            quota: 5,
            output_dir: PathBuf::from("local"),
            categories: vec!["chefs".to_string()],
            ..Args::default()
        };

        args.merge_from_config(
            config.config,
            &cli(&["-q", "5", "--output=local", "-cchefs"]),
        );

        assert_eq!(args.quota, 5);
        assert_eq!(args.output_dir, PathBuf::from("local"));
        assert_eq!(args.categories, vec!["chefs"]);
        // not given on the command line
        assert_eq!(args.parse_size().unwrap(), (160, 160));
    }

    #[test]
    fn test_load_and_merge_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        std::fs::write(&path, r#"{"config": {"quota": 2}}"#).unwrap();

        let mut args = Args {
            config_file: Some(path.clone()),
            ..Args::default()
        };
        let name = args.load_and_merge_config_with(&[]).unwrap();
        assert_eq!(name, Some(path.display().to_string()));
        assert_eq!(args.quota, 2);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(args.load_and_merge_config_with(&[]).is_err());
    }

    #[test]
    fn test_given_flag_forms() {
        let args = cli(&["--quota", "3", "--size=1x1", "-o", "x"]);
        assert!(given(&args, &["-q", "--quota"]));
        assert!(given(&args, &["-s", "--size"]));
        assert!(given(&args, &["-o", "--output"]));
        assert!(!given(&args, &["--timeout"]));
        assert!(!given(&args, &["--full-quality"]));
    }
}

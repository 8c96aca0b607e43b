use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::cli::Args;
use crate::crawl::Category;

/// Create a styled progress bar for one category, sized to its quota
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(template) = ProgressStyle::with_template(
        "{spinner:.blue} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
    ) {
        pb.set_style(template.progress_chars("#>-"));
    }
    pb
}

/// Format duration in a human-readable way
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", mins, secs)
    } else if total_secs > 0 {
        format!("{}.{:03}s", total_secs, millis)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Validate command line arguments
pub fn validate_inputs(args: &Args) -> Result<()> {
    if args.categories.iter().any(|c| c.trim().is_empty()) {
        return Err(anyhow::anyhow!("Category queries must not be empty"));
    }

    if let Some((first, second, slug)) = find_slug_collision(&args.categories()) {
        return Err(anyhow::anyhow!(
            "Categories '{}' and '{}' would both be stored in '{}'",
            first,
            second,
            slug
        ));
    }

    if let Some(input) = &args.input_path {
        if !input.is_dir() {
            return Err(anyhow::anyhow!(
                "Input path is not a directory: {}",
                input.display()
            ));
        }
    }

    args.parse_size().map_err(|e| anyhow::anyhow!(e))?;

    if args.detect_short_max == 0 {
        return Err(anyhow::anyhow!("--detect-short-max must be greater than 0"));
    }

    for (name, quality) in [
        ("--full-quality", args.full_quality),
        ("--resized-quality", args.resized_quality),
    ] {
        if quality == 0 || quality > 100 {
            return Err(anyhow::anyhow!(
                "{} must be between 1 and 100, got: {}",
                name,
                quality
            ));
        }
    }

    if args.max_eye_diff < 0.0 || args.max_center_offset < 0.0 {
        return Err(anyhow::anyhow!("Pose thresholds must not be negative"));
    }

    if args.timeout_secs == 0 {
        return Err(anyhow::anyhow!("--timeout must be at least 1 second"));
    }

    if !args.uses_onnx_detector() && args.detector_script.is_none() {
        return Err(anyhow::anyhow!(
            "No face detector configured. Pass --detector-script <FILE>{}",
            if cfg!(feature = "ai") {
                " or --model <FILE>"
            } else {
                ""
            }
        ));
    }

    Ok(())
}

/// Get file extension in lowercase
pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Check if a file has one of the specified extensions
pub fn has_valid_extension(path: &Path, extensions: &[String]) -> bool {
    if let Some(ext) = get_file_extension(path) {
        extensions.contains(&ext)
    } else {
        false
    }
}

/// Sanitize a name for use as a file or folder name on FAT32 and friends
pub fn sanitize_filename_for_fat32(filename: &str) -> String {
    // < > : " / \ | ? * and control characters
    let mut sanitized = String::with_capacity(filename.len());
    for ch in filename.chars() {
        let replacement = match ch {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        };
        sanitized.push(replacement);
    }

    let mut result = String::with_capacity(sanitized.len());
    let mut prev_was_underscore = false;
    for ch in sanitized.chars() {
        if ch == '_' {
            if !prev_was_underscore {
                result.push(ch);
            }
            prev_was_underscore = true;
        } else {
            result.push(ch);
            prev_was_underscore = false;
        }
    }

    let trimmed = result.trim_matches('_');

    const MAX_NAME_LENGTH: usize = 100;
    if trimmed.len() <= MAX_NAME_LENGTH {
        return trimmed.to_string();
    }

    // cut on a char boundary, preferably at a word boundary
    let mut end = MAX_NAME_LENGTH;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    let truncated = &trimmed[..end];
    match truncated.rfind('_') {
        Some(last_underscore) if last_underscore >= 80 => truncated[..last_underscore].to_string(),
        _ => truncated.to_string(),
    }
}

/// Folder name and file prefix of a category: spaces become underscores
pub fn category_slug(query: &str) -> String {
    let slug = sanitize_filename_for_fat32(&query.trim().replace(' ', "_"));
    if slug.is_empty() {
        "category".to_string()
    } else {
        slug
    }
}

/// First pair of categories sharing an output folder, with that folder name
pub fn find_slug_collision(categories: &[Category]) -> Option<(String, String, String)> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for category in categories {
        let slug = category.slug();
        if let Some(previous) = seen.get(&slug) {
            return Some((previous.to_string(), category.query.clone(), slug));
        }
        seen.insert(slug, &category.query);
    }
    None
}

/// Print verbose information if verbose mode is enabled
pub fn verbose_println(verbose: bool, message: &str) {
    if verbose {
        println!("{} {}", style("[VERBOSE]").dim(), message);
    }
}

/// Print a skipped source
pub fn skip_println(message: &str) {
    println!("{} {}", style("[SKIP]").yellow(), message);
}

/// Print a saved face
pub fn save_println(message: &str) {
    println!("{} {}", style("[SAVE]").green().bold(), message);
}

/// Print warning message
pub fn warn_println(message: &str) {
    println!("{} {}", style("[WARNING]").yellow().bold(), message);
}

/// Print error message
pub fn error_println(message: &str) {
    eprintln!("{} {}", style("[ERROR]").red().bold(), message);
}

/// Totals over all categories of a crawl
#[derive(Debug, Default)]
pub struct CrawlStats {
    pub categories: usize,
    pub quota_met: usize,
    pub sources_seen: usize,
    pub faces_saved: usize,
    pub skipped: usize,
    pub failed_categories: usize,
    pub total_duration: Duration,
}

impl CrawlStats {
    pub fn record(&mut self, report: &crate::crawl::CategoryReport) {
        self.categories += 1;
        if report.state == crate::crawl::RunState::QuotaMet {
            self.quota_met += 1;
        }
        if report.error.is_some() {
            self.failed_categories += 1;
        }
        self.sources_seen += report.sources_seen;
        self.faces_saved += report.saved.len();
        self.skipped += report.skipped;
    }

    /// Share of examined sources that produced a face, in percent
    pub fn yield_rate(&self) -> f64 {
        if self.sources_seen == 0 {
            0.0
        } else {
            (self.faces_saved as f64 / self.sources_seen as f64) * 100.0
        }
    }

    pub fn average_per_face(&self) -> Duration {
        if self.faces_saved == 0 {
            Duration::new(0, 0)
        } else {
            self.total_duration / self.faces_saved as u32
        }
    }
}

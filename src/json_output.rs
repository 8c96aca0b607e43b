//! JSON output for tool integration
//!
//! When --json-progress flag is enabled, all progress and status information
//! is emitted as JSON lines to stdout, suppressing all other output.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::crawl::{Category, CategoryReport, CrawlEvents, SavedFace, SkipReason};

/// Last progress emission timestamp (milliseconds since epoch)
/// Used for throttling progress updates to ~25 FPS (40ms between updates)
static LAST_PROGRESS_MS: AtomicU64 = AtomicU64::new(0);

const PROGRESS_INTERVAL_MS: u64 = 40;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    CategoryStarted {
        category: String,
        sources: usize,
        quota: usize,
    },
    /// Sources examined so far in the current category
    Progress {
        category: String,
        current: usize,
        total: usize,
        saved: usize,
    },
    FaceSaved {
        category: String,
        index: usize,
        source: String,
        full_path: String,
        resized_path: Option<String>,
        digest: String,
    },
    SourceSkipped {
        category: String,
        source_index: usize,
        reason: String,
    },
    CategoryFinished {
        category: String,
        state: String,
        saved: usize,
        sources_seen: usize,
        skipped: usize,
        duplicates: usize,
        error: Option<String>,
    },
    Warning {
        message: String,
    },
    Summary {
        categories: usize,
        faces_saved: usize,
        sources_seen: usize,
        duration_secs: f64,
    },
}

impl JsonMessage {
    /// Emit JSON message to stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    /// Emit a progress message, at most once every 40ms. The final update of
    /// a category (current == total) always goes out.
    pub fn progress(category: &str, current: usize, total: usize, saved: usize) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        if should_emit(now_ms, LAST_PROGRESS_MS.load(Ordering::Relaxed), current, total) {
            LAST_PROGRESS_MS.store(now_ms, Ordering::Relaxed);
            Self::Progress {
                category: category.to_string(),
                current,
                total,
                saved,
            }
            .emit();
        }
    }

    pub fn summary(categories: usize, faces_saved: usize, sources_seen: usize, duration_secs: f64) {
        Self::Summary {
            categories,
            faces_saved,
            sources_seen,
            duration_secs,
        }
        .emit();
    }
}

fn should_emit(now_ms: u64, last_ms: u64, current: usize, total: usize) -> bool {
    now_ms.saturating_sub(last_ms) >= PROGRESS_INTERVAL_MS || current == total
}

/// Crawl events rendered as JSON lines
#[derive(Debug, Default)]
pub struct JsonReporter {
    sources_total: usize,
    sources_done: usize,
    saved: usize,
}

impl JsonReporter {
    fn advance(&mut self, category: &Category) {
        self.sources_done += 1;
        JsonMessage::progress(
            &category.query,
            self.sources_done,
            self.sources_total,
            self.saved,
        );
    }
}

impl CrawlEvents for JsonReporter {
    fn category_started(&mut self, category: &Category, sources: usize) {
        self.sources_total = sources;
        self.sources_done = 0;
        self.saved = 0;
        JsonMessage::CategoryStarted {
            category: category.query.clone(),
            sources,
            quota: category.quota,
        }
        .emit();
    }

    fn source_skipped(&mut self, category: &Category, source: usize, reason: &SkipReason) {
        JsonMessage::SourceSkipped {
            category: category.query.clone(),
            source_index: source,
            reason: reason.to_string(),
        }
        .emit();
        self.advance(category);
    }

    fn face_saved(&mut self, category: &Category, face: &SavedFace) {
        self.saved += 1;
        JsonMessage::FaceSaved {
            category: category.query.clone(),
            index: face.index,
            source: face.source.clone(),
            full_path: face.full_path.display().to_string(),
            resized_path: face.resized_path.as_ref().map(|p| p.display().to_string()),
            digest: face.digest.to_string(),
        }
        .emit();
        self.advance(category);
    }

    fn warning(&mut self, message: &str) {
        JsonMessage::Warning {
            message: message.to_string(),
        }
        .emit();
    }

    fn category_finished(&mut self, report: &CategoryReport) {
        JsonMessage::CategoryFinished {
            category: report.category.query.clone(),
            state: report.state.to_string(),
            saved: report.saved.len(),
            sources_seen: report.sources_seen,
            skipped: report.skipped,
            duplicates: report.duplicates,
            error: report.error.clone(),
        }
        .emit();
    }
}

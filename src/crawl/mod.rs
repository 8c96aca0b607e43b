pub mod fetch;
pub mod search;

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use strum_macros::Display;

use crate::image_processing::acceptance::Rejection;
use crate::image_processing::crop::{write_jpeg, FaceWriter};
use crate::image_processing::debug_overlay::draw_candidates;
use crate::image_processing::dedup::{ContentDigest, DedupLedger};
use crate::image_processing::detector::FaceDetector;
use crate::image_processing::geometry::FaceBox;
use crate::image_processing::{decode_image, FacePipeline, FaceSelection};
use crate::utils::category_slug;

use fetch::ImageFetcher;
use search::{ImageSearch, SearchHit};

/// Search query plus the number of faces wanted for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub query: String,
    pub quota: usize,
}

impl Category {
    pub fn new(query: impl Into<String>, quota: usize) -> Self {
        Self {
            query: query.into(),
            quota,
        }
    }

    /// Folder and file-name prefix
    pub fn slug(&self) -> String {
        category_slug(&self.query)
    }
}

/// Lifecycle of one category run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[strum(to_string = "pending")]
    Pending,
    #[strum(to_string = "collecting")]
    Collecting,
    #[strum(to_string = "quota met")]
    QuotaMet,
    #[strum(to_string = "sources exhausted")]
    SourcesExhausted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::QuotaMet | RunState::SourcesExhausted)
    }
}

/// Saved-count bookkeeping and state transitions for a category
#[derive(Debug, Clone)]
pub struct CategoryRun {
    state: RunState,
    quota: usize,
    saved: usize,
}

impl CategoryRun {
    pub fn new(quota: usize) -> Self {
        Self {
            state: RunState::Pending,
            quota,
            saved: 0,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn saved(&self) -> usize {
        self.saved
    }

    /// The source list is available. A zero quota is met right away.
    pub fn begin(&mut self) {
        if self.state == RunState::Pending {
            self.state = if self.quota == 0 {
                RunState::QuotaMet
            } else {
                RunState::Collecting
            };
        }
    }

    /// Count one saved face and return its 1-based index
    pub fn record_saved(&mut self) -> usize {
        debug_assert_eq!(self.state, RunState::Collecting);
        self.saved += 1;
        if self.saved >= self.quota {
            self.state = RunState::QuotaMet;
        }
        self.saved
    }

    /// No more sources
    pub fn exhaust(&mut self) {
        if self.state == RunState::Collecting {
            self.state = RunState::SourcesExhausted;
        }
    }
}

/// Why a source image produced no saved face
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    BadMetadata(String),
    NotHttp(String),
    FetchFailed(String),
    NotAnImage(String),
    Undecodable(String),
    DetectorFailed(String),
    NoFaces,
    /// Candidates found, none acceptable
    NoAcceptableFace(usize),
    PersistFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::BadMetadata(e) => write!(f, "unreadable result metadata: {}", e),
            SkipReason::NotHttp(url) => write!(f, "not an http URL: {}", url),
            SkipReason::FetchFailed(e) => write!(f, "download failed: {}", e),
            SkipReason::NotAnImage(content_type) => {
                write!(f, "not an image (Content-Type: {})", content_type)
            }
            SkipReason::Undecodable(e) => write!(f, "cannot decode image: {}", e),
            SkipReason::DetectorFailed(e) => write!(f, "face detection failed: {}", e),
            SkipReason::NoFaces => write!(f, "no faces detected"),
            SkipReason::NoAcceptableFace(candidates) => {
                write!(f, "no acceptable face ({} candidates)", candidates)
            }
            SkipReason::PersistFailed(e) => write!(f, "could not save face: {}", e),
        }
    }
}

/// A face that reached the output directory (or would have, in dry runs)
#[derive(Debug, Clone)]
pub struct SavedFace {
    pub index: usize,
    pub source: String,
    pub original_box: FaceBox,
    pub digest: ContentDigest,
    pub full_path: PathBuf,
    pub resized_path: Option<PathBuf>,
}

/// Outcome of one category
#[derive(Debug, Clone)]
pub struct CategoryReport {
    pub category: Category,
    pub output_dir: PathBuf,
    pub state: RunState,
    pub sources_total: usize,
    pub sources_seen: usize,
    pub saved: Vec<SavedFace>,
    pub skipped: usize,
    pub duplicates: usize,
    pub persist_failures: usize,
    pub error: Option<String>,
}

impl CategoryReport {
    fn new(category: &Category, output_dir: PathBuf) -> Self {
        Self {
            category: category.clone(),
            output_dir,
            state: RunState::Pending,
            sources_total: 0,
            sources_seen: 0,
            saved: Vec::new(),
            skipped: 0,
            duplicates: 0,
            persist_failures: 0,
            error: None,
        }
    }
}

/// Hooks for progress display; every method defaults to doing nothing
pub trait CrawlEvents {
    fn category_started(&mut self, _category: &Category, _sources: usize) {}
    fn source_skipped(&mut self, _category: &Category, _source: usize, _reason: &SkipReason) {}
    fn candidate_rejected(
        &mut self,
        _category: &Category,
        _source: usize,
        _candidate: usize,
        _rejection: &Rejection,
    ) {
    }
    fn face_saved(&mut self, _category: &Category, _face: &SavedFace) {}
    fn warning(&mut self, _message: &str) {}
    fn category_finished(&mut self, _report: &CategoryReport) {}
}

/// Events sink that ignores everything
pub struct NoopEvents;

impl CrawlEvents for NoopEvents {}

/// Output-side settings of a crawl
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub output_root: PathBuf,
    pub writer: FaceWriter,
    /// Also write the detection image with candidate boxes drawn on it
    pub debug: bool,
}

/// Drives search, download and the face pipeline one category at a time
pub struct Crawler<S, F, D> {
    search: S,
    fetcher: F,
    pipeline: FacePipeline<D>,
    settings: CrawlSettings,
}

impl<S: ImageSearch, F: ImageFetcher, D: FaceDetector> Crawler<S, F, D> {
    pub fn new(search: S, fetcher: F, pipeline: FacePipeline<D>, settings: CrawlSettings) -> Self {
        Self {
            search,
            fetcher,
            pipeline,
            settings,
        }
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    /// Run every category in order
    pub fn run(
        &mut self,
        categories: &[Category],
        events: &mut dyn CrawlEvents,
    ) -> Vec<CategoryReport> {
        categories
            .iter()
            .map(|category| self.run_category(category, events))
            .collect()
    }

    /// Collect faces for one category until its quota is met or the
    /// sources run out. Failures of single sources never abort the run.
    pub fn run_category(
        &mut self,
        category: &Category,
        events: &mut dyn CrawlEvents,
    ) -> CategoryReport {
        let slug = category.slug();
        let output_dir = self.settings.output_root.join(&slug);
        let mut report = CategoryReport::new(category, output_dir.clone());

        if let Err(e) = self.prepare_output_dir(&output_dir) {
            report.error = Some(format!("{:#}", e));
            events.category_finished(&report);
            return report;
        }

        let hits = match self.search.search(&category.query) {
            Ok(hits) => hits,
            Err(e) => {
                report.error = Some(format!("{:#}", e));
                events.category_finished(&report);
                return report;
            }
        };

        let mut run = CategoryRun::new(category.quota);
        run.begin();
        report.sources_total = hits.len();
        events.category_started(category, hits.len());

        // per-category ledger: identical crops in different categories are both kept
        let mut ledger = DedupLedger::new();

        for (source_idx, hit) in hits.iter().enumerate() {
            if run.state() != RunState::Collecting {
                break;
            }
            report.sources_seen += 1;

            let result = self.process_source(
                category,
                &slug,
                &output_dir,
                source_idx,
                hit,
                run.saved() + 1,
                &mut ledger,
                &mut report,
                events,
            );

            match result {
                Ok(face) => {
                    run.record_saved();
                    events.face_saved(category, &face);
                    report.saved.push(face);
                }
                Err(reason) => {
                    if matches!(reason, SkipReason::PersistFailed(_)) {
                        report.persist_failures += 1;
                    }
                    report.skipped += 1;
                    events.source_skipped(category, source_idx, &reason);
                }
            }
        }

        run.exhaust();
        report.state = run.state();
        events.category_finished(&report);
        report
    }

    fn prepare_output_dir(&self, output_dir: &Path) -> Result<()> {
        if self.settings.writer.dry_run {
            return Ok(());
        }
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create {}", output_dir.display()))
    }

    #[allow(clippy::too_many_arguments)]
    fn process_source(
        &mut self,
        category: &Category,
        slug: &str,
        output_dir: &Path,
        source_idx: usize,
        hit: &SearchHit,
        index: usize,
        ledger: &mut DedupLedger,
        report: &mut CategoryReport,
        events: &mut dyn CrawlEvents,
    ) -> Result<SavedFace, SkipReason> {
        let location = hit.image_url()?;

        let fetched = self
            .fetcher
            .fetch(&location)
            .map_err(|e| SkipReason::FetchFailed(format!("{:#}", e)))?;

        if !fetched.is_image() {
            return Err(SkipReason::NotAnImage(fetched.content_type));
        }

        let original = decode_image(&fetched.bytes)
            .map_err(|e| SkipReason::Undecodable(format!("{:#}", e)))?;

        let selection = self
            .pipeline
            .select_face(&original, ledger)
            .map_err(|e| SkipReason::DetectorFailed(format!("{:#}", e)))?;

        for (candidate_idx, rejection) in &selection.rejections {
            if *rejection == Rejection::Duplicate {
                report.duplicates += 1;
            }
            events.candidate_rejected(category, source_idx, *candidate_idx, rejection);
        }

        if selection.candidates.is_empty() {
            return Err(SkipReason::NoFaces);
        }

        let face = match &selection.accepted {
            Some(face) => face,
            None => return Err(SkipReason::NoAcceptableFace(selection.candidates.len())),
        };

        let outcome = self
            .settings
            .writer
            .persist(output_dir, slug, index, &face.crop);

        let full_path = match outcome.full {
            Ok(path) => path,
            Err(e) => {
                // the face was never stored, let an identical crop try again
                ledger.forget(&face.digest);
                return Err(SkipReason::PersistFailed(format!("{:#}", e)));
            }
        };

        let resized_path = match outcome.resized {
            Ok(path) => Some(path),
            Err(e) => {
                events.warning(&format!("Resized copy of face {} not saved: {:#}", index, e));
                None
            }
        };

        if self.settings.debug {
            if let Err(e) = self.write_debug_overlay(output_dir, slug, index, &selection) {
                events.warning(&format!("Debug overlay not saved: {:#}", e));
            }
        }

        Ok(SavedFace {
            index,
            source: location,
            original_box: face.original_box,
            digest: face.digest,
            full_path,
            resized_path,
        })
    }

    fn write_debug_overlay(
        &self,
        output_dir: &Path,
        slug: &str,
        index: usize,
        selection: &FaceSelection,
    ) -> Result<()> {
        if self.settings.writer.dry_run {
            return Ok(());
        }
        let Some(detection_image) = &selection.detection_image else {
            return Ok(());
        };

        let accepted = selection.accepted.as_ref().map(|f| f.candidate_index);
        let canvas = draw_candidates(detection_image, &selection.candidates, accepted);
        let path = output_dir.join(format!("{}_{}_debug.jpg", slug, index));
        write_jpeg(&canvas, &path, self.settings.writer.resized_quality)
    }
}

//! Human-readable crawl output: one progress bar per category plus styled
//! status lines.

use console::style;
use indicatif::ProgressBar;

use crate::crawl::{Category, CategoryReport, CrawlEvents, RunState, SavedFace, SkipReason};
use crate::image_processing::acceptance::Rejection;
use crate::utils::{
    create_progress_bar, error_println, save_println, skip_println, verbose_println, warn_println,
};

pub struct ConsoleReporter {
    verbose: bool,
    bar: Option<ProgressBar>,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose, bar: None }
    }

    /// Print without tearing the progress bar
    fn print(&self, f: impl FnOnce()) {
        match &self.bar {
            Some(bar) => bar.suspend(f),
            None => f(),
        }
    }
}

impl CrawlEvents for ConsoleReporter {
    fn category_started(&mut self, category: &Category, sources: usize) {
        println!(
            "{} {} ({} sources, quota {})",
            style("Category:").bold().blue(),
            style(&category.query).bold(),
            sources,
            category.quota
        );
        let bar = create_progress_bar(category.quota as u64);
        bar.set_message(category.slug());
        self.bar = Some(bar);
    }

    fn source_skipped(&mut self, _category: &Category, source: usize, reason: &SkipReason) {
        if self.verbose {
            self.print(|| skip_println(&format!("source #{}: {}", source + 1, reason)));
        }
        if let SkipReason::PersistFailed(message) = reason {
            self.print(|| error_println(message));
        }
    }

    fn candidate_rejected(
        &mut self,
        _category: &Category,
        source: usize,
        candidate: usize,
        rejection: &Rejection,
    ) {
        if !self.verbose {
            return;
        }
        self.print(|| {
            verbose_println(
                true,
                &format!(
                    "source #{} candidate {}: {}",
                    source + 1,
                    candidate + 1,
                    rejection
                ),
            )
        });
    }

    fn face_saved(&mut self, _category: &Category, face: &SavedFace) {
        if self.verbose {
            self.print(|| {
                save_println(&format!(
                    "{} ({}x{} from {}) [{}]",
                    face.full_path.display(),
                    face.original_box.width,
                    face.original_box.height,
                    face.source,
                    face.digest.short()
                ))
            });
        }
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn warning(&mut self, message: &str) {
        self.print(|| warn_println(message));
    }

    fn category_finished(&mut self, report: &CategoryReport) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }

        let saved = report.saved.len();
        let state = match report.state {
            RunState::QuotaMet => style(report.state.to_string()).green().bold(),
            RunState::SourcesExhausted => style(report.state.to_string()).yellow().bold(),
            _ => style(report.state.to_string()).red().bold(),
        };
        println!(
            "  {} {}/{} faces, {} of {} sources examined",
            state, saved, report.category.quota, report.sources_seen, report.sources_total
        );
        if let Some(error) = &report.error {
            error_println(&format!("{}: {}", report.category.query, error));
        }
        println!();
    }
}

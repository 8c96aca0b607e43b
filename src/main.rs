use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::time::{Duration, Instant};

use facecrawl::cli::Args;
use facecrawl::console_output::ConsoleReporter;
use facecrawl::crawl::fetch::{
    build_http_client, FileFetcher, HttpFetcher, ImageFetcher, DEFAULT_USER_AGENT,
};
use facecrawl::crawl::search::{BingImageSearch, ImageSearch, LocalImageSearch};
use facecrawl::crawl::{CrawlEvents, CrawlSettings, Crawler};
use facecrawl::image_processing::detector::FaceDetector;
use facecrawl::image_processing::external_detection::ExternalFaceDetector;
use facecrawl::image_processing::FacePipeline;
use facecrawl::json_output::{JsonMessage, JsonReporter};
use facecrawl::report::print_report;
use facecrawl::utils::{format_duration, validate_inputs, verbose_println, warn_println, CrawlStats};

/// Pick the detector: the ONNX model when built with `ai` and `--model` is
/// given, otherwise the external script.
fn build_detector(args: &Args, log: bool) -> Result<Box<dyn FaceDetector>> {
    #[cfg(feature = "ai")]
    {
        if let Some(model) = &args.model {
            const ONNX_INPUT_SIZE: (u32, u32) = (640, 640);
            let detector = facecrawl::image_processing::onnx_detection::OnnxFaceDetector::new(
                model,
                ONNX_INPUT_SIZE,
                args.confidence_threshold,
            )?;
            return Ok(Box::new(detector));
        }
    }

    match &args.detector_script {
        Some(script) => Ok(Box::new(ExternalFaceDetector::new(
            &args.python,
            script,
            log && args.verbose,
        )?)),
        None => anyhow::bail!("No face detector configured"),
    }
}

/// Web search and download, or a local directory when `--input` is set
fn build_sources(args: &Args) -> Result<(Box<dyn ImageSearch>, Box<dyn ImageFetcher>)> {
    match &args.input_path {
        Some(root) => Ok((
            Box::new(LocalImageSearch::new(root.clone(), args.parse_extensions())),
            Box::new(FileFetcher),
        )),
        None => {
            let client =
                build_http_client(Duration::from_secs(args.timeout_secs), DEFAULT_USER_AGENT)?;
            Ok((
                Box::new(BingImageSearch::new(client.clone())),
                Box::new(HttpFetcher::new(client)),
            ))
        }
    }
}

fn print_configuration(args: &Args, detector_name: &str) {
    println!("{}", style("Configuration:").bold());
    println!("  Output: {}", args.output_dir.display());
    match &args.input_path {
        Some(input) => println!("  Source: local directory {}", input.display()),
        None => println!("  Source: Bing image search (timeout {}s)", args.timeout_secs),
    }
    println!("  Detector: {}", detector_name);
    println!("  Quota per category: {}", args.quota);
    println!("  Minimum face size: {}px", args.min_face_size);
    println!("  Detection short-edge cap: {}px", args.detect_short_max);
    println!(
        "  Frontal thresholds: eye diff < {}, nose offset < {} ({:?} space)",
        args.max_eye_diff, args.max_center_offset, args.pose_space
    );
    println!(
        "  Outputs: full crop (q{}) + {} (q{})",
        args.full_quality, args.size, args.resized_quality
    );
    if args.debug {
        println!("  Debug mode: enabled - detection overlays are saved next to each face");
    }
    if args.dry_run {
        println!("  Dry run mode: enabled (simulation only - no files will be created)");
    }
    println!();
}

fn print_summary(stats: &CrawlStats, dry_run: bool) {
    if dry_run {
        println!("{}", style("Dry Run Results Summary:").bold().cyan());
    } else {
        println!("{}", style("Results Summary:").bold().green());
    }
    println!(
        "  Categories: {} ({} reached their quota)",
        stats.categories,
        style(stats.quota_met).bold().green()
    );
    println!(
        "  Faces saved: {}",
        style(stats.faces_saved).bold().green()
    );
    println!(
        "  Sources examined: {} ({} skipped, yield {:.1}%)",
        stats.sources_seen,
        style(stats.skipped).yellow(),
        stats.yield_rate()
    );
    if stats.failed_categories > 0 {
        println!(
            "  Failed categories: {}",
            style(stats.failed_categories).bold().red()
        );
    }
    println!();
    println!("{}", style("Performance:").bold().blue());
    println!(
        "  Total time: {}",
        style(format_duration(stats.total_duration)).bold()
    );
    if stats.faces_saved > 0 {
        println!(
            "  Average per face: {}",
            style(format_duration(stats.average_per_face())).dim()
        );
    }
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let mut args = Args::parse();
    let profile = args.load_and_merge_config()?;
    let human = !args.json_progress;

    if human {
        println!("{}", style("facecrawl - Face Dataset Collector").bold().blue());
        println!("{}", style("Frontal face crawler for training datasets").dim());
        println!();
        if let Some(profile) = &profile {
            verbose_println(args.verbose, &format!("Loaded configuration: {}", profile));
        }
    }

    validate_inputs(&args)?;

    if args.model.is_some() && !args.uses_onnx_detector() && human {
        warn_println("--model ignored: rebuild with --features ai to enable the ONNX detector");
    }

    let detector = build_detector(&args, human)?;
    if human {
        print_configuration(&args, detector.name());
    }

    if !args.dry_run {
        std::fs::create_dir_all(&args.output_dir).with_context(|| {
            format!(
                "Failed to create output directory {}",
                args.output_dir.display()
            )
        })?;
    } else {
        verbose_println(
            args.verbose && human,
            "Dry run mode: Skipping output directory creation",
        );
    }

    let (search, fetcher) = build_sources(&args)?;
    let writer = args.face_writer().map_err(|e| anyhow::anyhow!(e))?;
    let pipeline = FacePipeline::new(detector, args.pipeline_config());
    let mut crawler = Crawler::new(
        search,
        fetcher,
        pipeline,
        CrawlSettings {
            output_root: args.output_dir.clone(),
            writer,
            debug: args.debug,
        },
    );

    let mut events: Box<dyn CrawlEvents> = if human {
        Box::new(ConsoleReporter::new(args.verbose))
    } else {
        Box::new(JsonReporter::default())
    };

    let categories = args.categories();
    let reports = crawler.run(&categories, events.as_mut());

    let mut stats = CrawlStats::default();
    for report in &reports {
        stats.record(report);
    }
    stats.total_duration = start_time.elapsed();

    if human {
        print_summary(&stats, args.dry_run);
        if args.report {
            print_report(&reports);
        }
    } else {
        JsonMessage::summary(
            stats.categories,
            stats.faces_saved,
            stats.sources_seen,
            stats.total_duration.as_secs_f64(),
        );
    }

    if stats.categories > 0 && stats.failed_categories == stats.categories {
        anyhow::bail!("No category could be crawled");
    }
    Ok(())
}

// Library exports for the facecrawl binary and integration tests
pub mod cli;
pub mod config_file;
pub mod console_output;
pub mod crawl;
pub mod image_processing;
pub mod json_output;
pub mod report;
pub mod utils;

// Re-export commonly used types
pub use crawl::{Category, CategoryReport, CrawlEvents, Crawler, RunState, SkipReason};
pub use image_processing::{FacePipeline, FaceSelection, PipelineConfig};
pub use json_output::JsonMessage;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::Url;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::path::PathBuf;
use walkdir::WalkDir;

use super::SkipReason;
use crate::utils::{category_slug, has_valid_extension};

const BING_IMAGE_SEARCH: &str = "https://www.bing.com/images/search";

/// One entry of a search result list, resolved lazily so that a malformed
/// entry only costs that one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchHit {
    /// Raw result metadata (JSON with the full-size image URL under `murl`)
    Metadata(String),
    /// Direct location: a URL or a local file path
    Location(String),
}

#[derive(Debug, Deserialize)]
struct ResultMetadata {
    murl: Option<String>,
}

impl SearchHit {
    /// Location of the full-size image
    pub fn image_url(&self) -> Result<String, SkipReason> {
        match self {
            SearchHit::Location(location) => Ok(location.clone()),
            SearchHit::Metadata(raw) => {
                let metadata: ResultMetadata = serde_json::from_str(raw)
                    .map_err(|e| SkipReason::BadMetadata(e.to_string()))?;
                match metadata.murl {
                    Some(url) if url.starts_with("http") => Ok(url),
                    Some(url) => Err(SkipReason::NotHttp(url)),
                    None => Err(SkipReason::BadMetadata("no image URL".to_string())),
                }
            }
        }
    }
}

/// Source list provider for a category query
pub trait ImageSearch {
    fn search(&mut self, query: &str) -> Result<Vec<SearchHit>>;
}

impl<S: ImageSearch + ?Sized> ImageSearch for Box<S> {
    fn search(&mut self, query: &str) -> Result<Vec<SearchHit>> {
        (**self).search(query)
    }
}

/// Bing image search, first result page only
pub struct BingImageSearch {
    client: Client,
}

impl BingImageSearch {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn search_url(query: &str) -> Result<Url> {
        Url::parse_with_params(
            BING_IMAGE_SEARCH,
            &[
                ("q", query),
                ("form", "HDRSC2"),
                ("first", "1"),
                ("tsc", "ImageBasicHover"),
            ],
        )
        .context("Failed to build search URL")
    }
}

/// Extract result entries (`a.iusc` anchors and their `m` metadata) from a
/// result page, in page order
pub fn parse_result_page(html: &str) -> Result<Vec<SearchHit>> {
    let document = Html::parse_document(html);
    let selector =
        Selector::parse("a.iusc").map_err(|e| anyhow::anyhow!("Invalid selector: {:?}", e))?;

    Ok(document
        .select(&selector)
        .map(|element| {
            SearchHit::Metadata(element.value().attr("m").unwrap_or_default().to_string())
        })
        .collect())
}

impl ImageSearch for BingImageSearch {
    fn search(&mut self, query: &str) -> Result<Vec<SearchHit>> {
        let url = Self::search_url(query)?;
        let html = self
            .client
            .get(url.clone())
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .with_context(|| format!("Search request failed: {}", url))?;

        parse_result_page(&html)
    }
}

/// Offline source: image files under `<root>/<category slug>/`, or directly
/// under `root` when that folder does not exist
pub struct LocalImageSearch {
    root: PathBuf,
    extensions: Vec<String>,
}

impl LocalImageSearch {
    pub fn new(root: PathBuf, extensions: Vec<String>) -> Self {
        Self { root, extensions }
    }
}

impl ImageSearch for LocalImageSearch {
    fn search(&mut self, query: &str) -> Result<Vec<SearchHit>> {
        let category_dir = self.root.join(category_slug(query));
        let dir = if category_dir.is_dir() {
            category_dir
        } else {
            self.root.clone()
        };

        if !dir.is_dir() {
            anyhow::bail!("Input directory does not exist: {}", dir.display());
        }

        let mut hits = Vec::new();
        for entry in WalkDir::new(&dir)
            .follow_links(false)
            .max_depth(10)
            .sort_by_file_name()
        {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();
            if path.is_file() && has_valid_extension(path, &self.extensions) {
                hits.push(SearchHit::Location(path.display().to_string()));
            }
        }
        Ok(hits)
    }
}

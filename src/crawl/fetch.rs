use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::path::Path;
use std::time::Duration;

use crate::utils::get_file_extension;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// Downloaded source: body bytes plus the declared content type
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl FetchedImage {
    /// Only `image/*` payloads enter the face pipeline
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

pub trait ImageFetcher {
    fn fetch(&mut self, location: &str) -> Result<FetchedImage>;
}

impl<F: ImageFetcher + ?Sized> ImageFetcher for Box<F> {
    fn fetch(&mut self, location: &str) -> Result<FetchedImage> {
        (**self).fetch(location)
    }
}

/// Blocking HTTP client shared by search and download
pub fn build_http_client(timeout: Duration, user_agent: &str) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .context("Failed to create HTTP client")
}

/// Single-attempt HTTP download; any failure skips the source
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&mut self, location: &str) -> Result<FetchedImage> {
        let response = self
            .client
            .get(location)
            .send()
            .and_then(|response| response.error_for_status())
            .with_context(|| format!("Request failed: {}", location))?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let bytes = response
            .bytes()
            .with_context(|| format!("Failed to read body: {}", location))?
            .to_vec();

        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}

/// Content type for a local file, inferred from its extension
pub fn content_type_for(path: &Path) -> &'static str {
    match get_file_extension(path).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Reads sources from the local filesystem
#[derive(Debug, Default)]
pub struct FileFetcher;

impl ImageFetcher for FileFetcher {
    fn fetch(&mut self, location: &str) -> Result<FetchedImage> {
        let path = Path::new(location);
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(FetchedImage {
            bytes,
            content_type: content_type_for(path).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_gate() {
        let fetched = |content_type: &str| FetchedImage {
            bytes: Vec::new(),
            content_type: content_type.to_string(),
        };
        assert!(fetched("image/jpeg").is_image());
        assert!(fetched("image/webp; charset=binary").is_image());
        assert!(!fetched("text/html; charset=utf-8").is_image());
        assert!(!fetched("").is_image());
        assert!(!fetched("Image/JPEG").is_image());
    }

    #[test]
    fn test_content_type_for_extension() {
        assert_eq!(content_type_for(Path::new("a/b.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("b.webp")), "image/webp");
        assert_eq!(content_type_for(Path::new("notes.txt")), "application/octet-stream");
        assert_eq!(content_type_for(Path::new("no_extension")), "application/octet-stream");
    }

    #[test]
    fn test_file_fetcher() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        std::fs::write(&path, b"pixels").unwrap();

        let fetched = FileFetcher.fetch(&path.display().to_string()).unwrap();
        assert_eq!(fetched.bytes, b"pixels");
        assert_eq!(fetched.content_type, "image/png");

        assert!(FileFetcher
            .fetch(&dir.path().join("missing.png").display().to_string())
            .is_err());
    }
}

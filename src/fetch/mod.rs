// src/fetch/mod.rs

pub mod download;
pub mod metadata;

pub use download::{fetch_json, fetch_table, fetch_with_retry, HttpDownloader, RetryPolicy};
pub use metadata::{get_countries, get_endpoints_metadata, Country, EndpointMetadata};

/// How a single request failed. The retry loop branches on this.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("quota exceeded fetching {url}")]
    QuotaExceeded { url: String },
    #[error("resource not found: {url}")]
    NotFound { url: String },
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

/// The narrow HTTP surface the pipeline needs.
pub trait Downloader {
    /// GET `url` and return the raw response body.
    fn download(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    /// `url` with provider parameters (locale, subscription key) appended.
    fn full_url(&self, url: &str) -> String;
}

impl<D: Downloader + ?Sized> Downloader for &D {
    fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        (**self).download(url)
    }

    fn full_url(&self, url: &str) -> String {
        (**self).full_url(url)
    }
}

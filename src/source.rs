//! Source resolution: turn image references into local files.
//!
//! A reference is either a local path or an absolute `http`/`https` URL.
//! Local paths pass through unchanged; their existence is checked when the
//! image is classified. Remote references are fetched through a [`Fetcher`],
//! sniffed and decoded to make sure they hold a PNG or GIF, and written to a
//! `downloaded_*` file in the call's work directory.

use crate::types::SourceFormat;
use reqwest::Url;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{reference} is not a supported image ({detected}); supported formats are png, gif")]
    UnsupportedFormat { reference: String, detected: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Retrieves the raw bytes behind a URL.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP(S) fetcher on `reqwest`.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| FetchError::Request {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().map_err(request_error)?;
        debug!(url, bytes = bytes.len(), "fetched remote image");
        Ok(bytes.to_vec())
    }
}

/// Whether `reference` is an absolute HTTP(S) URL.
pub fn is_remote(reference: &str) -> bool {
    Url::parse(reference).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

/// Identify and decode `bytes`, accepting only PNG and GIF.
pub fn sniff_format(reference: &str, bytes: &[u8]) -> Result<SourceFormat, ResolveError> {
    let unsupported = |detected: String| ResolveError::UnsupportedFormat {
        reference: reference.to_string(),
        detected,
    };
    let detected = image::guess_format(bytes).map_err(|_| unsupported("unknown".into()))?;
    let format = SourceFormat::from_image_format(detected)
        .ok_or_else(|| unsupported(format!("{detected:?}").to_lowercase()))?;
    image::load_from_memory_with_format(bytes, detected)
        .map_err(|e| unsupported(format!("undecodable {}: {e}", format.extension())))?;
    Ok(format)
}

/// Resolve one reference to a local file.
///
/// Remote images are written into `work_dir`, which the caller owns.
pub fn resolve(
    fetcher: &dyn Fetcher,
    reference: &str,
    work_dir: &Path,
) -> Result<PathBuf, ResolveError> {
    if !is_remote(reference) {
        return Ok(PathBuf::from(reference));
    }
    let bytes = fetcher.fetch(reference)?;
    let format = sniff_format(reference, &bytes)?;

    let mut file = tempfile::Builder::new()
        .prefix("downloaded_")
        .suffix(&format!(".{}", format.extension()))
        .tempfile_in(work_dir)?;
    file.write_all(&bytes)?;
    let path = file.into_temp_path().keep().map_err(|e| e.error)?;
    debug!(reference, path = %path.display(), "saved remote image");
    Ok(path)
}

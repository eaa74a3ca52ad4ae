//! Icon source locations and the blocking remote fetch.

use crate::{Error, Result};
use reqwest::Url;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Where the new master icon comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconSource {
    /// A PNG on the local filesystem.
    Local(PathBuf),
    /// An `http(s)` URL fetched before processing.
    Remote(Url),
}

impl IconSource {
    /// Interpret `location` as a URL (`http://`, `https://`, `file://`) or a path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a malformed URL.
    pub fn parse(location: &str) -> Result<Self> {
        let lower = location.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(location)
                .map_err(|e| Error::Config(format!("Invalid icon URL {location}: {e}")))?;
            Ok(IconSource::Remote(url))
        } else if lower.starts_with("file://") {
            let url = Url::parse(location)
                .map_err(|e| Error::Config(format!("Invalid icon URL {location}: {e}")))?;
            let path = url
                .to_file_path()
                .map_err(|()| Error::Config(format!("Not a local file URL: {location}")))?;
            Ok(IconSource::Local(path))
        } else {
            Ok(IconSource::Local(PathBuf::from(location)))
        }
    }

    /// Resolve to a readable local file, fetching remote sources.
    ///
    /// A fetched file lives in a [`NamedTempFile`] held by the returned
    /// [`LocalIcon`] and is deleted when that value is dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] with [`io::ErrorKind::NotFound`] for a missing local file.
    /// - [`Error::IconDownloadFailed`] if a remote fetch fails.
    pub fn materialize(&self, options: &FetchOptions) -> Result<LocalIcon> {
        match self {
            IconSource::Local(path) => {
                if !path.is_file() {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("Icon not found at {}", path.display()),
                    )));
                }
                Ok(LocalIcon::Borrowed(path.clone()))
            }
            IconSource::Remote(url) => Ok(LocalIcon::Downloaded(fetch_icon(url, options)?)),
        }
    }
}

impl From<PathBuf> for IconSource {
    fn from(path: PathBuf) -> Self {
        IconSource::Local(path)
    }
}

impl From<&Path> for IconSource {
    fn from(path: &Path) -> Self {
        IconSource::Local(path.to_path_buf())
    }
}

/// An icon available on the local filesystem.
#[derive(Debug)]
pub enum LocalIcon {
    /// The caller's own file.
    Borrowed(PathBuf),
    /// A downloaded temporary file, removed on drop.
    Downloaded(NamedTempFile),
}

impl LocalIcon {
    /// Path of the icon file.
    pub fn path(&self) -> &Path {
        match self {
            LocalIcon::Borrowed(path) => path,
            LocalIcon::Downloaded(file) => file.path(),
        }
    }
}

/// Timeouts for the remote icon fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Limit for establishing the connection.
    pub connect_timeout: Duration,
    /// Limit for the whole request including the body transfer.
    pub transfer_timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            transfer_timeout: Duration::from_secs(60),
        }
    }
}

/// Download `url` into a temporary `.png` file.
///
/// Blocks the calling thread until the transfer completes, fails or times
/// out. Nothing is returned for a partial transfer.
///
/// # Errors
///
/// Returns [`Error::IconDownloadFailed`] on connection failure, timeout,
/// a non-2xx status or when the body cannot be stored.
pub fn fetch_icon(url: &Url, options: &FetchOptions) -> Result<NamedTempFile> {
    fetch_icon_in(url, options, &std::env::temp_dir())
}

/// [`fetch_icon`] storing the body under `dir`.
pub(crate) fn fetch_icon_in(url: &Url, options: &FetchOptions, dir: &Path) -> Result<NamedTempFile> {
    let client = reqwest::blocking::Client::builder()
        .connect_timeout(options.connect_timeout)
        .timeout(options.transfer_timeout)
        .build()
        .map_err(|e| Error::IconDownloadFailed(format!("Failed to build HTTP client: {e}")))?;

    tracing::debug!("Fetching icon from {url}");
    let response = client.get(url.clone()).send().map_err(|e| {
        if e.is_timeout() {
            Error::IconDownloadFailed(format!("Timed out fetching {url}"))
        } else if e.is_connect() {
            Error::IconDownloadFailed(format!("Cannot connect to {url}: {e}"))
        } else {
            Error::IconDownloadFailed(format!("Request to {url} failed: {e}"))
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::IconDownloadFailed(format!(
            "HTTP status {status} for {url}"
        )));
    }

    let body = response
        .bytes()
        .map_err(|e| Error::IconDownloadFailed(format!("Failed to read body from {url}: {e}")))?;

    let store_failed =
        |e: io::Error| Error::IconDownloadFailed(format!("Cannot store icon from {url}: {e}"));
    let mut file = tempfile::Builder::new()
        .prefix("ipastamp-icon-")
        .suffix(".png")
        .tempfile_in(dir)
        .map_err(store_failed)?;
    file.write_all(&body).map_err(store_failed)?;
    file.flush().map_err(store_failed)?;

    tracing::debug!("Fetched {} bytes into {}", body.len(), file.path().display());
    Ok(file)
}

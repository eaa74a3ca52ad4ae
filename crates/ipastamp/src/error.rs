//! Error types for ipastamp operations.
//!
//! This module defines the [`enum@Error`] enum covering every failure an
//! editing session can hit: locating and unpacking the template archive,
//! decoding and re-encoding `Info.plist`, validating and fetching icons,
//! repackaging, and the external signing/asset tools.
//!
//! Structural document operations (`get`, permissive `replace`, `remove`)
//! never produce an error; absence or a type mismatch simply has no effect.
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use std::path::PathBuf;
use thiserror::Error;

/// Error type for ipastamp operations.
///
/// # Examples
///
/// ```no_run
/// use ipastamp::{Error, IpaEditor};
///
/// match IpaEditor::open("Template.ipa") {
///     Ok(_editor) => println!("opened"),
///     Err(Error::TemplateNotFound(path)) => eprintln!("missing template: {}", path.display()),
///     Err(Error::InvalidPackage(msg)) => eprintln!("not an app archive: {msg}"),
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// The template archive does not exist.
    #[error("Template IPA not found at {}", .0.display())]
    TemplateNotFound(PathBuf),

    /// No `.app` directory could be located in the extracted archive.
    ///
    /// Both the `Payload/<Name>.app` layout and the flat `<Name>.app`
    /// layout were tried.
    #[error("Invalid package: {0}")]
    InvalidPackage(String),

    /// The metadata file could not be read from disk.
    #[error("Failed to read metadata file {}: {source}", path.display())]
    MetadataReadFailed {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The metadata file is not a property list with a dictionary root.
    #[error("Failed to decode metadata file {}: {reason}", path.display())]
    MetadataDecodeFailed {
        /// File that was being decoded.
        path: PathBuf,
        /// Decoder message.
        reason: String,
    },

    /// The in-memory document could not be serialized.
    #[error("Failed to encode metadata: {0}")]
    MetadataEncodeFailed(#[source] plist::Error),

    /// The serialized document could not be written back.
    #[error("Failed to write metadata file {}: {source}", path.display())]
    MetadataWriteFailed {
        /// Destination file.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// A strict replace targeted a key that is not present.
    ///
    /// Only [`crate::MetadataDocument::replace_existing`] produces this.
    #[error("Key not present in metadata: {0}")]
    KeyNotPresent(String),

    /// The icon source could not be decoded or is not square.
    #[error("Invalid icon format: {0}")]
    InvalidIconFormat(String),

    /// The icon source is square but not the required master size.
    #[error("Invalid icon size {width}x{height}, expected {expected}x{expected}")]
    InvalidIconSize {
        /// Measured width in pixels.
        width: u32,
        /// Measured height in pixels.
        height: u32,
        /// Required edge length in pixels.
        expected: u32,
    },

    /// A remote icon could not be fetched.
    ///
    /// Covers connection errors, timeouts, and non-success HTTP statuses.
    #[error("Icon download failed: {0}")]
    IconDownloadFailed(String),

    /// Building the output archive failed.
    #[error("Packaging failed: {0}")]
    PackagingFailed(String),

    /// The workspace's scratch directory has already been removed.
    #[error("Workspace already disposed")]
    WorkspaceDisposed,

    /// An external tool (`codesign`, `security`, `actool`) failed.
    #[error("{tool} failed: {message}")]
    ExternalTool {
        /// Tool name.
        tool: String,
        /// Exit status or stderr summary.
        message: String,
    },

    /// Invalid configuration or edit manifest.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive operation failed.
    ///
    /// Occurs while extracting the template. Failures while writing the
    /// output archive are reported as [`Error::PackagingFailed`].
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

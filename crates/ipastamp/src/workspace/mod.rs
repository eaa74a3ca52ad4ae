//! Scratch workspace for one archive editing session.
//!
//! [`ArchiveWorkspace`] walks through `open → resolve → (edit)* → package
//! → dispose`. The scratch directory is a [`TempDir`], so it is removed
//! when the workspace is dropped even if an earlier step failed;
//! [`ArchiveWorkspace::dispose`] removes it eagerly and reports errors.
//!
//! # Examples
//!
//! ```no_run
//! use ipastamp::workspace::ArchiveWorkspace;
//!
//! let mut workspace = ArchiveWorkspace::open("Template.ipa")?;
//! let app = workspace.resolve_application_root()?;
//! std::fs::write(app.join("extra.txt"), b"hello")?;
//! workspace.package("out/App.ipa")?;
//! workspace.dispose()?;
//! # Ok::<(), ipastamp::Error>(())
//! ```

pub mod archive;
pub mod extract;

pub use archive::{write_archive, write_archive_to, CompressionLevel};
pub use extract::{extract_archive, find_application_root, APP_EXTENSION, PAYLOAD_DIR};

use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Name of the extracted-contents directory inside the scratch root.
const CONTENTS_DIR: &str = "contents";

/// An extracted template archive.
///
/// The scratch root holds the extracted contents plus the staging file
/// used while packaging, so packaging never writes inside the tree being
/// archived.
#[derive(Debug)]
pub struct ArchiveWorkspace {
    scratch: Option<TempDir>,
    source: PathBuf,
    compression_level: CompressionLevel,
}

impl ArchiveWorkspace {
    /// Extract `source` into a fresh scratch directory.
    ///
    /// # Errors
    ///
    /// - [`Error::TemplateNotFound`] if `source` does not exist.
    /// - [`Error::Zip`] / [`Error::Io`] if extraction fails. The partially
    ///   filled scratch directory is removed before returning.
    pub fn open(source: impl AsRef<Path>) -> Result<Self> {
        Self::open_in(source.as_ref(), &std::env::temp_dir())
    }

    /// [`open`](Self::open) with the scratch directory created under `parent`.
    pub(crate) fn open_in(source: &Path, parent: &Path) -> Result<Self> {
        if !source.exists() {
            return Err(Error::TemplateNotFound(source.to_path_buf()));
        }

        let scratch = tempfile::Builder::new()
            .prefix("ipastamp-")
            .tempdir_in(parent)?;
        extract_archive(source, scratch.path().join(CONTENTS_DIR))?;
        tracing::info!(
            "Extracted {} into {}",
            source.display(),
            scratch.path().display()
        );

        Ok(Self {
            scratch: Some(scratch),
            source: source.to_path_buf(),
            compression_level: CompressionLevel::default(),
        })
    }

    /// Set the compression level used by [`package`](Self::package).
    pub fn compression_level(mut self, level: impl Into<CompressionLevel>) -> Self {
        self.compression_level = level.into();
        self
    }

    /// Change the compression level of an open workspace.
    pub fn set_compression_level(&mut self, level: impl Into<CompressionLevel>) {
        self.compression_level = level.into();
    }

    /// The template archive this workspace was opened from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.scratch.is_none()
    }

    /// Directory holding the extracted archive contents.
    pub fn contents_path(&self) -> Result<PathBuf> {
        Ok(self.scratch_root()?.join(CONTENTS_DIR))
    }

    /// Locate the `.app` directory under either supported layout.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPackage`] if no application directory exists.
    pub fn resolve_application_root(&self) -> Result<PathBuf> {
        let app = find_application_root(self.contents_path()?)?;
        tracing::debug!("Application root: {}", app.display());
        Ok(app)
    }

    /// Build an archive of the current contents and move it to `to`.
    ///
    /// The archive is written to a staging file in the scratch root first;
    /// `to` is only replaced once that succeeds. Missing parent directories
    /// of `to` are created.
    ///
    /// # Errors
    ///
    /// [`Error::PackagingFailed`] if the archive cannot be built or moved
    /// into place.
    pub fn package(&self, to: impl AsRef<Path>) -> Result<PathBuf> {
        let to = to.as_ref();
        let root = self.scratch_root()?;
        let contents = root.join(CONTENTS_DIR);

        let staging = tempfile::Builder::new()
            .prefix("package-")
            .suffix(".ipa")
            .tempfile_in(root)
            .map_err(|e| {
                Error::PackagingFailed(format!("Cannot stage archive in {}: {e}", root.display()))
            })?;
        write_archive_to(&contents, staging.as_file(), self.compression_level)?;

        if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                Error::PackagingFailed(format!("Cannot create {}: {e}", parent.display()))
            })?;
        }
        if to.symlink_metadata().is_ok() {
            fs::remove_file(to).map_err(|e| {
                Error::PackagingFailed(format!("Cannot replace {}: {e}", to.display()))
            })?;
        }

        if let Err(persist) = staging.persist(to) {
            // Rename fails across filesystems; fall back to a copy.
            tracing::debug!("Rename into place failed ({}), copying", persist.error);
            fs::copy(persist.file.path(), to).map_err(|e| {
                Error::PackagingFailed(format!("Cannot write {}: {e}", to.display()))
            })?;
        }

        tracing::info!("Packaged {}", to.display());
        Ok(to.to_path_buf())
    }

    /// Remove the scratch directory. Safe to call more than once.
    pub fn dispose(&mut self) -> Result<()> {
        if let Some(scratch) = self.scratch.take() {
            let path = scratch.path().to_path_buf();
            scratch.close()?;
            tracing::debug!("Removed scratch directory {}", path.display());
        }
        Ok(())
    }

    fn scratch_root(&self) -> Result<&Path> {
        self.scratch
            .as_ref()
            .map(TempDir::path)
            .ok_or(Error::WorkspaceDisposed)
    }
}

//! Output archive construction.
//!
//! The scratch directory is zipped as-is, so whichever layout the template
//! used (`Payload/<Name>.app` or a flat `<Name>.app`) is reproduced.

use crate::{Error, Result};
use std::fs::{self, File};
use std::io::{self, Seek, Write};
use std::path::{Component, Path};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// ZIP compression level for the output archive.
///
/// # Examples
///
/// ```
/// use ipastamp::workspace::CompressionLevel;
///
/// assert_eq!(CompressionLevel::default().level(), 6);
/// assert_eq!(CompressionLevel::new(42).level(), 9);
/// assert!(CompressionLevel::NONE.is_stored());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    /// Store entries uncompressed.
    pub const NONE: CompressionLevel = CompressionLevel(0);

    /// Deflate level 6.
    pub const DEFAULT: CompressionLevel = CompressionLevel(6);

    /// Deflate level 9.
    pub const MAX: CompressionLevel = CompressionLevel(9);

    /// Level 0-9; larger values are clamped to 9.
    #[must_use]
    pub fn new(level: u32) -> Self {
        CompressionLevel(level.min(9))
    }

    /// The level value (0-9).
    #[must_use]
    pub fn level(&self) -> u32 {
        self.0
    }

    /// Whether entries are stored without compression.
    #[must_use]
    pub fn is_stored(&self) -> bool {
        self.0 == 0
    }

    fn file_options(self) -> SimpleFileOptions {
        if self.is_stored() {
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(i64::from(self.0)))
        }
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u32> for CompressionLevel {
    fn from(level: u32) -> Self {
        CompressionLevel::new(level)
    }
}

/// Zip the contents of `src_dir` into a new file at `output_path`.
///
/// Paths are stored relative to `src_dir`, not including `src_dir` itself.
///
/// # Errors
///
/// Returns [`Error::PackagingFailed`] if walking, reading or writing fails.
pub fn write_archive(
    src_dir: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    compression_level: CompressionLevel,
) -> Result<()> {
    let output_path = output_path.as_ref();
    let file = File::create(output_path).map_err(|e| {
        Error::PackagingFailed(format!("Cannot create {}: {e}", output_path.display()))
    })?;
    write_archive_to(src_dir, file, compression_level)
}

/// Zip the contents of `src_dir` into `writer`.
///
/// Every directory gets its own entry, symlinks are stored as links and
/// Unix permission bits are kept on regular files. Entries are added in
/// file-name order so repeated runs produce the same archive layout.
pub fn write_archive_to<W: Write + Seek>(
    src_dir: impl AsRef<Path>,
    writer: W,
    compression_level: CompressionLevel,
) -> Result<()> {
    let src_dir = src_dir.as_ref();
    build(src_dir, writer, compression_level)
        .map_err(|e| Error::PackagingFailed(format!("{}: {e}", src_dir.display())))
}

fn build<W: Write + Seek>(src_dir: &Path, writer: W, compression_level: CompressionLevel) -> io::Result<()> {
    if !src_dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            "source directory does not exist",
        ));
    }

    let mut zip = ZipWriter::new(writer);
    let options = compression_level.file_options();
    let mut entries = 0usize;

    for entry in WalkDir::new(src_dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::other)?;
        let path = entry.path();
        let relative = path
            .strip_prefix(src_dir)
            .map_err(|_| io::Error::other(format!("{} is outside the source", path.display())))?;
        let name = archive_name(relative)?;

        let metadata = fs::symlink_metadata(path)?;
        if metadata.is_dir() {
            zip.add_directory(format!("{name}/"), options)?;
        } else if metadata.file_type().is_symlink() {
            let target = fs::read_link(path)?;
            zip.add_symlink(name, target.to_string_lossy().into_owned(), options)?;
        } else {
            #[cfg(unix)]
            let options = {
                use std::os::unix::fs::PermissionsExt;
                options.unix_permissions(metadata.permissions().mode())
            };
            zip.start_file(name, options)?;
            io::copy(&mut File::open(path)?, &mut zip)?;
        }
        entries += 1;
    }

    zip.finish()?;
    tracing::debug!("Archived {entries} entries from {}", src_dir.display());
    Ok(())
}

/// `/`-separated archive name for a relative path.
fn archive_name(relative: &Path) -> io::Result<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            other => {
                return Err(io::Error::other(format!(
                    "unexpected path component {other:?} in {}",
                    relative.display()
                )))
            }
        }
    }
    Ok(parts.join("/"))
}

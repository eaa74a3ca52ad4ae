//! Template extraction and application-root lookup.

use crate::{Error, Result};
use memmap2::Mmap;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Directory holding the application in the standard layout.
pub const PAYLOAD_DIR: &str = "Payload";

/// Extension of an application directory.
pub const APP_EXTENSION: &str = "app";

/// A file entry scheduled for extraction.
struct PendingFile {
    index: usize,
    outpath: PathBuf,
    is_symlink: bool,
    #[cfg(unix)]
    unix_mode: Option<u32>,
}

/// Extract every entry of `archive_path` into `dest_dir`.
///
/// The archive is memory-mapped and file entries are inflated in parallel,
/// each worker opening its own reader over the shared map. Directory
/// entries are created first. Entries whose names escape `dest_dir` are
/// skipped. On Unix, symlinks and permission bits are restored.
///
/// # Errors
///
/// - [`Error::TemplateNotFound`] if `archive_path` does not exist.
/// - [`Error::Zip`] if it is not a readable ZIP archive.
/// - [`Error::Io`] if writing into `dest_dir` fails.
pub fn extract_archive(archive_path: impl AsRef<Path>, dest_dir: impl AsRef<Path>) -> Result<()> {
    let archive_path = archive_path.as_ref();
    let dest_dir = dest_dir.as_ref();

    if !archive_path.is_file() {
        return Err(Error::TemplateNotFound(archive_path.to_path_buf()));
    }

    let file = File::open(archive_path)?;
    // SAFETY: the template is opened read-only and not modified while mapped.
    let mmap = unsafe { Mmap::map(&file)? };
    let mut archive = ZipArchive::new(Cursor::new(&mmap[..]))?;

    fs::create_dir_all(dest_dir)?;

    let mut dirs: BTreeSet<PathBuf> = BTreeSet::new();
    let mut files: Vec<PendingFile> = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!("Skipping unsafe archive entry {:?}", entry.name());
            continue;
        };
        let outpath = dest_dir.join(relative);

        if entry.is_dir() {
            dirs.insert(outpath);
            continue;
        }
        if let Some(parent) = outpath.parent() {
            dirs.insert(parent.to_path_buf());
        }

        #[cfg(unix)]
        let unix_mode = entry.unix_mode();
        #[cfg(unix)]
        let is_symlink = unix_mode.is_some_and(|mode| mode & 0o170000 == 0o120000);
        #[cfg(not(unix))]
        let is_symlink = false;

        files.push(PendingFile {
            index,
            outpath,
            is_symlink,
            #[cfg(unix)]
            unix_mode,
        });
    }

    for dir in &dirs {
        fs::create_dir_all(dir)?;
    }

    files.par_iter().try_for_each(|pending| -> Result<()> {
        let mut archive = ZipArchive::new(Cursor::new(&mmap[..]))?;
        let mut entry = archive.by_index(pending.index)?;

        #[cfg(unix)]
        if pending.is_symlink {
            let mut target = String::new();
            entry.read_to_string(&mut target)?;
            if pending.outpath.symlink_metadata().is_ok() {
                fs::remove_file(&pending.outpath)?;
            }
            std::os::unix::fs::symlink(&target, &pending.outpath)?;
            return Ok(());
        }
        #[cfg(not(unix))]
        let _ = pending.is_symlink;

        let mut outfile = File::create(&pending.outpath)?;
        io::copy(&mut entry, &mut outfile)?;

        #[cfg(unix)]
        if let Some(mode) = pending.unix_mode {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&pending.outpath, fs::Permissions::from_mode(mode & 0o7777))?;
        }
        Ok(())
    })?;

    tracing::debug!(
        "Extracted {} files from {} into {}",
        files.len(),
        archive_path.display(),
        dest_dir.display()
    );
    Ok(())
}

/// Locate the application directory inside an extracted archive.
///
/// Looks for `Payload/<Name>.app` first and falls back to `<Name>.app`
/// directly under `scratch_dir`. Candidates are compared by name so the
/// result does not depend on directory iteration order.
///
/// # Errors
///
/// Returns [`Error::InvalidPackage`] if neither layout has an `.app`
/// directory.
pub fn find_application_root(scratch_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let scratch_dir = scratch_dir.as_ref();

    let payload_dir = scratch_dir.join(PAYLOAD_DIR);
    if payload_dir.is_dir() {
        if let Some(app) = first_app_dir(&payload_dir)? {
            return Ok(app);
        }
        tracing::debug!("{PAYLOAD_DIR}/ has no .{APP_EXTENSION} directory, trying archive root");
    }

    first_app_dir(scratch_dir)?.ok_or_else(|| {
        Error::InvalidPackage(format!(
            "No .{APP_EXTENSION} directory in {PAYLOAD_DIR}/ or at the archive root"
        ))
    })
}

fn first_app_dir(dir: &Path) -> Result<Option<PathBuf>> {
    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() && path.extension().is_some_and(|ext| ext == APP_EXTENSION) {
            candidates.push(path);
        }
    }
    candidates.sort();
    Ok(candidates.into_iter().next())
}

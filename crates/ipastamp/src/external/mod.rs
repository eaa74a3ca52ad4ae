//! Wrappers around the Xcode command-line tools.
//!
//! Signing and asset-catalog compilation are delegated to `codesign`,
//! `security` and `actool`; this module only builds their arguments, runs
//! them, and feeds their output back into the session. Both require macOS
//! with the Xcode tools installed.

pub mod actool;
pub mod codesign;

pub use actool::{merge_partial_info, AssetCatalogCompiler};
pub use codesign::{entitlements_from_profile, framework_bundles, Resigner};

use crate::{Error, Result};
use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;

/// Run `program` with `args` and return its stdout.
///
/// # Errors
///
/// [`Error::ExternalTool`] if the program cannot be started or exits
/// unsuccessfully; the message carries the exit status and stderr.
pub fn run_tool<I, S>(program: &Path, args: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let tool = program
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string());

    let mut command = Command::new(program);
    command.args(args);
    tracing::debug!("Running {command:?}");

    let output = command.output().map_err(|e| Error::ExternalTool {
        tool: tool.clone(),
        message: format!("cannot start {}: {e}", program.display()),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::ExternalTool {
            tool,
            message: format!("{} ({})", output.status, stderr.trim()),
        });
    }
    Ok(output.stdout)
}

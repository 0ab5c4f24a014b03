//! All-or-nothing placement of the verified binary.
//!
//! The bytes go to a staging file next to the destination, get their mode
//! set, and are renamed over `<bin_dir>/unraidcli`. The destination is
//! therefore either the previous binary or the new one, never a partial
//! write.

use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cleanup::{CleanupGuard, SharedCleanupContext};
use crate::error::InstallError;
use crate::formula::BINARY_NAME;
use crate::runtime::Runtime;

pub const EXECUTABLE_MODE: u32 = 0o755;

/// Staging file used while installing into `bin_dir`.
pub fn staging_path(bin_dir: &Path) -> PathBuf {
    bin_dir.join(format!(".{}.{}.tmp", BINARY_NAME, std::process::id()))
}

/// Write `bytes` to `bin_dir/unraidcli` as an executable, replacing any
/// previous installation. Returns the installed path.
#[tracing::instrument(skip(runtime, bytes, cleanup))]
pub fn place_binary<R: Runtime>(
    runtime: &R,
    bytes: &[u8],
    bin_dir: &Path,
    cleanup: &SharedCleanupContext,
) -> Result<PathBuf, InstallError> {
    if !runtime.is_dir(bin_dir) {
        debug!("Creating {:?}", bin_dir);
        runtime
            .create_dir_all(bin_dir)
            .map_err(|e| InstallError::from_runtime(bin_dir, e))?;
    }

    let destination = bin_dir.join(BINARY_NAME);
    let staging = staging_path(bin_dir);
    let _guard = CleanupGuard::new(Arc::clone(cleanup), staging.clone());

    if let Err(e) = stage_and_commit(runtime, bytes, &staging, &destination) {
        if runtime.exists(&staging) {
            if let Err(remove_err) = runtime.remove_file(&staging) {
                warn!("Failed to remove staging file {:?}: {}", staging, remove_err);
            }
        }
        return Err(e);
    }

    Ok(destination)
}

fn stage_and_commit<R: Runtime>(
    runtime: &R,
    bytes: &[u8],
    staging: &Path,
    destination: &Path,
) -> Result<(), InstallError> {
    runtime
        .write(staging, bytes)
        .map_err(|e| InstallError::from_runtime(destination, e))?;
    runtime
        .set_permissions(staging, EXECUTABLE_MODE)
        .map_err(|e| InstallError::from_runtime(destination, e))?;
    runtime
        .rename(staging, destination)
        .map_err(|e| InstallError::from_runtime(destination, e))?;
    Ok(())
}

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::runtime::Runtime;

/// Directory the binary is installed into when none is given.
///
/// Privileged users get the system-wide bin directory; everyone else gets
/// `~/.local/bin`.
#[tracing::instrument(skip(runtime))]
pub fn default_bin_dir<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    if runtime.is_privileged() {
        Ok(system_bin_dir())
    } else {
        let home_dir = runtime
            .home_dir()
            .context("Could not find home directory")?;
        Ok(home_dir.join(".local").join("bin"))
    }
}

pub fn resolve_bin_dir<R: Runtime>(runtime: &R, bin_dir: Option<PathBuf>) -> Result<PathBuf> {
    match bin_dir {
        Some(path) => Ok(path),
        None => default_bin_dir(runtime),
    }
}

#[cfg(not(target_os = "windows"))]
fn system_bin_dir() -> PathBuf {
    PathBuf::from("/usr/local/bin")
}

#[cfg(target_os = "windows")]
fn system_bin_dir() -> PathBuf {
    PathBuf::from(r"C:\ProgramData\unraidcli\bin")
}

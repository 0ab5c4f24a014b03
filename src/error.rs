//! Error taxonomy for the install pipeline.
//!
//! Every stage of the pipeline fails with one of these variants. The
//! application layer wraps them in `anyhow::Error`, so callers can recover
//! the typed cause with `downcast_ref::<InstallError>()`.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// The host os/arch pair has no release artifact.
    #[error("unsupported platform: {os}/{arch} (supported: macos/amd64, macos/arm64, linux/amd64, linux/arm64)")]
    UnsupportedPlatform { os: String, arch: String },

    /// Transport failure or an unexpected HTTP status.
    #[error("network error fetching {url}: {reason}")]
    NetworkError { url: String, reason: String },

    /// The release asset does not exist (HTTP 404).
    #[error("release asset not found: {url}")]
    NotFound { url: String },

    #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    /// The formula carries no digest for this target yet.
    #[error(
        "no SHA-256 digest has been published for {url}; refusing to install an unverified artifact"
    )]
    DigestNotYetPublished { url: String },

    #[error("permission denied writing {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("no space left on device writing {}", path.display())]
    DiskFull { path: PathBuf },

    #[error("self-check failed for {}: {reason}", path.display())]
    SelfCheckFailed { path: PathBuf, reason: String },

    /// The formula document failed load-time validation.
    #[error("invalid formula: {0}")]
    InvalidFormula(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl InstallError {
    /// Map a filesystem failure at `path` onto the taxonomy.
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem => {
                InstallError::PermissionDenied { path }
            }
            io::ErrorKind::StorageFull => InstallError::DiskFull { path },
            _ => InstallError::Io { path, source },
        }
    }

    /// Classify an `anyhow` error raised by the runtime while touching `path`.
    ///
    /// The underlying `io::Error` is found through any context layers.
    pub fn from_runtime(path: impl Into<PathBuf>, err: anyhow::Error) -> Self {
        let path = path.into();
        match err.downcast::<io::Error>() {
            Ok(source) => Self::from_io(path, source),
            Err(other) => InstallError::Io {
                path,
                source: io::Error::other(other.to_string()),
            },
        }
    }
}

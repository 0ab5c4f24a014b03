//! SHA-256 digests pinned by the formula.

use std::fmt;

use log::debug;
use sha2::{Digest, Sha256};

use crate::error::InstallError;

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// A validated, lowercase hex-encoded SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Parse a hex digest. Uppercase input is accepted and normalised.
    pub fn parse(value: &str) -> Result<Self, InstallError> {
        let value = value.trim();
        if value.len() != DIGEST_HEX_LEN {
            return Err(InstallError::InvalidFormula(format!(
                "sha256 must be {} hex characters, got {}",
                DIGEST_HEX_LEN,
                value.len()
            )));
        }
        if let Some(bad) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(InstallError::InvalidFormula(format!(
                "sha256 contains non-hex character '{}'",
                bad
            )));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    /// Digest of `bytes`.
    pub fn of(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The digest a release target is pinned to.
///
/// Release pipelines publish the formula before the artifacts are hashed, so
/// a target may legitimately carry no digest yet. That state is explicit and
/// never verifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinnedDigest {
    Published(Sha256Digest),
    Unpublished,
}

impl PinnedDigest {
    /// Read the `sha256` field of a formula document; empty means unpublished.
    pub fn from_field(value: &str) -> Result<Self, InstallError> {
        if value.trim().is_empty() {
            Ok(PinnedDigest::Unpublished)
        } else {
            Sha256Digest::parse(value).map(PinnedDigest::Published)
        }
    }

    /// The `sha256` field as written back into a formula document.
    pub fn as_field(&self) -> &str {
        match self {
            PinnedDigest::Published(d) => d.as_str(),
            PinnedDigest::Unpublished => "",
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, PinnedDigest::Published(_))
    }

    /// Check `bytes` fetched from `url` against the pinned digest.
    pub fn verify(&self, bytes: &[u8], url: &str) -> Result<(), InstallError> {
        let expected = match self {
            PinnedDigest::Published(d) => d,
            PinnedDigest::Unpublished => {
                return Err(InstallError::DigestNotYetPublished {
                    url: url.to_string(),
                });
            }
        };

        let actual = Sha256Digest::of(bytes);
        debug!("Calculated SHA256: {} ({} bytes)", actual, bytes.len());
        debug!("Expected SHA256:   {}", expected);

        if &actual == expected {
            Ok(())
        } else {
            Err(InstallError::ChecksumMismatch {
                url: url.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            })
        }
    }
}

impl fmt::Display for PinnedDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinnedDigest::Published(d) => write!(f, "sha256:{}", d),
            PinnedDigest::Unpublished => f.write_str("(not yet published)"),
        }
    }
}

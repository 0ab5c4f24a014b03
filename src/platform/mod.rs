//! Host platform detection.
//!
//! A [`Platform`] is the tagged `Os` × `Arch` pair used as the key of the
//! formula's target table. Only the four combinations built by the release
//! pipeline are representable; anything else fails to parse with
//! [`InstallError::UnsupportedPlatform`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InstallError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    #[serde(alias = "darwin")]
    Macos,
    Linux,
}

impl Os {
    /// Token used in release asset names (`unraidcli-darwin-arm64`).
    pub fn asset_token(self) -> &'static str {
        match self {
            Os::Macos => "darwin",
            Os::Linux => "linux",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Os::Macos => "macos",
            Os::Linux => "linux",
        }
    }
}

impl FromStr for Os {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "macos" | "darwin" | "osx" | "mac" => Ok(Os::Macos),
            "linux" => Ok(Os::Linux),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// Intel-compatible 64-bit.
    #[serde(alias = "x86_64", alias = "intel")]
    Amd64,
    #[serde(alias = "aarch64")]
    Arm64,
}

impl Arch {
    pub fn asset_token(self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
        }
    }
}

impl FromStr for Arch {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "amd64" | "x86_64" | "x64" | "intel" => Ok(Arch::Amd64),
            "arm64" | "aarch64" => Ok(Arch::Arm64),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.asset_token())
    }
}

/// Platform information for target selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    /// Every platform the release pipeline publishes an artifact for.
    pub const ALL: [Platform; 4] = [
        Platform::new(Os::Macos, Arch::Amd64),
        Platform::new(Os::Macos, Arch::Arm64),
        Platform::new(Os::Linux, Arch::Amd64),
        Platform::new(Os::Linux, Arch::Arm64),
    ];

    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Parse raw OS and architecture identifiers.
    pub fn parse(os: &str, arch: &str) -> Result<Self, InstallError> {
        match (os.parse::<Os>(), arch.parse::<Arch>()) {
            (Ok(os), Ok(arch)) => Ok(Self { os, arch }),
            _ => Err(InstallError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            }),
        }
    }

    /// Detect the current platform
    pub fn detect() -> Result<Self, InstallError> {
        Self::parse(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Asset file name for this platform, e.g. `unraidcli-linux-amd64`.
    pub fn asset_name(&self, binary: &str) -> String {
        format!(
            "{}-{}-{}",
            binary,
            self.os.asset_token(),
            self.arch.asset_token()
        )
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// Trait for platform detection (useful for testing)
#[cfg_attr(test, mockall::automock)]
pub trait PlatformDetector: Send + Sync {
    fn detect(&self) -> Result<Platform, InstallError>;
}

/// Default platform detector using compile-time detection
pub struct HostPlatformDetector;

impl PlatformDetector for HostPlatformDetector {
    fn detect(&self) -> Result<Platform, InstallError> {
        Platform::detect()
    }
}

/// Uses an explicit os/arch pair instead of the host.
pub struct FixedPlatform(pub Platform);

impl PlatformDetector for FixedPlatform {
    fn detect(&self) -> Result<Platform, InstallError> {
        Ok(self.0)
    }
}

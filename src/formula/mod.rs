//! The unraidcli formula: version, homepage and the per-platform target table.
//!
//! A formula document is JSON (see `unraidcli.json` for the packaged one).
//! All validation happens when the document is loaded, so a [`Formula`] in
//! hand always has exactly one well-formed [`ReleaseTarget`] per supported
//! platform.

mod digest;

use anyhow::{Context, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::InstallError;
use crate::platform::{Arch, Os, Platform};
use crate::runtime::Runtime;

pub use digest::{PinnedDigest, Sha256Digest};

const BUILTIN_FORMULA: &str = include_str!("unraidcli.json");

/// Name the binary is installed under.
pub const BINARY_NAME: &str = "unraidcli";

/// Formula document as stored on disk
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FormulaDocument {
    pub name: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    pub version: String,
    pub targets: Vec<TargetDocument>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TargetDocument {
    pub os: Os,
    pub arch: Arch,
    pub url: String,
    /// Hex SHA-256 of the asset; empty until the release pipeline fills it in.
    #[serde(default)]
    pub sha256: String,
}

/// The per-platform download/verification record for one release artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseTarget {
    pub platform: Platform,
    pub url: String,
    pub digest: PinnedDigest,
    pub version: Version,
}

impl ReleaseTarget {
    pub fn os(&self) -> Os {
        self.platform.os
    }

    pub fn arch(&self) -> Arch {
        self.platform.arch
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    pub name: String,
    pub desc: Option<String>,
    pub homepage: Option<String>,
    pub version: Version,
    targets: BTreeMap<Platform, ReleaseTarget>,
}

impl Formula {
    /// The formula shipped with this installer.
    pub fn builtin() -> Result<Self, InstallError> {
        Self::from_json(BUILTIN_FORMULA)
    }

    pub fn from_json(content: &str) -> Result<Self, InstallError> {
        let doc: FormulaDocument = serde_json::from_str(content)
            .map_err(|e| InstallError::InvalidFormula(e.to_string()))?;
        Self::from_document(doc)
    }

    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read formula {:?}", path))?;
        let formula = Self::from_json(&content)?;
        Ok(formula)
    }

    /// Validate a document into a formula.
    pub fn from_document(doc: FormulaDocument) -> Result<Self, InstallError> {
        if doc.name.trim().is_empty() {
            return Err(InstallError::InvalidFormula("name is empty".into()));
        }

        let version = Version::parse(doc.version.trim_start_matches('v')).map_err(|e| {
            InstallError::InvalidFormula(format!("version {:?}: {}", doc.version, e))
        })?;

        let mut targets = BTreeMap::new();
        for t in doc.targets {
            let platform = Platform::new(t.os, t.arch);
            check_url(&doc.name, &version, platform, &t.url)?;
            let digest = PinnedDigest::from_field(&t.sha256).map_err(|e| {
                InstallError::InvalidFormula(format!("target {}: {}", platform, e))
            })?;

            let target = ReleaseTarget {
                platform,
                url: t.url,
                digest,
                version: version.clone(),
            };
            if targets.insert(platform, target).is_some() {
                return Err(InstallError::InvalidFormula(format!(
                    "duplicate target {}",
                    platform
                )));
            }
        }

        let missing: Vec<String> = Platform::ALL
            .iter()
            .filter(|p| !targets.contains_key(*p))
            .map(|p| p.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(InstallError::InvalidFormula(format!(
                "missing targets: {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            name: doc.name,
            desc: doc.desc,
            homepage: doc.homepage,
            version,
            targets,
        })
    }

    pub fn to_document(&self) -> FormulaDocument {
        FormulaDocument {
            name: self.name.clone(),
            desc: self.desc.clone(),
            homepage: self.homepage.clone(),
            version: self.version.to_string(),
            targets: self
                .targets()
                .map(|t| TargetDocument {
                    os: t.os(),
                    arch: t.arch(),
                    url: t.url.clone(),
                    sha256: t.digest.as_field().to_string(),
                })
                .collect(),
        }
    }

    /// Select the target for `platform`.
    pub fn resolve(&self, platform: Platform) -> Result<&ReleaseTarget, InstallError> {
        self.targets
            .get(&platform)
            .ok_or_else(|| InstallError::UnsupportedPlatform {
                os: platform.os.to_string(),
                arch: platform.arch.to_string(),
            })
    }

    pub fn targets(&self) -> impl Iterator<Item = &ReleaseTarget> {
        self.targets.values()
    }
}

/// A target URL must name this version's release and this platform's asset.
fn check_url(
    name: &str,
    version: &Version,
    platform: Platform,
    url: &str,
) -> Result<(), InstallError> {
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(InstallError::InvalidFormula(format!(
            "target {}: url must be http(s): {}",
            platform, url
        )));
    }

    let tag = format!("/v{}/", version);
    if !url.contains(&tag) {
        return Err(InstallError::InvalidFormula(format!(
            "target {}: url {} does not embed release {}",
            platform,
            url,
            tag.trim_matches('/')
        )));
    }

    let asset = format!("/{}", platform.asset_name(name));
    if !url.ends_with(&asset) {
        return Err(InstallError::InvalidFormula(format!(
            "target {}: url {} does not end with {}",
            platform,
            url,
            asset.trim_start_matches('/')
        )));
    }

    Ok(())
}

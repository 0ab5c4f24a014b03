//! The install pipeline: resolve → fetch → verify → install → self-check.
//!
//! Each stage is terminal on failure. The first four stages never touch the
//! destination directory until the artifact has been verified, and the
//! placement itself is a rename, so a failed run leaves the previous state
//! of the bin directory intact.

use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{
    cleanup::{self, SharedCleanupContext},
    formula::{BINARY_NAME, Formula, ReleaseTarget},
    http::HttpClient,
    platform::{Platform, PlatformDetector},
    runtime::Runtime,
};

pub mod config;
mod fetch;
mod paths;
mod place;
mod self_check;

pub use config::{Config, GlobalOptions};
pub use fetch::{fetch, verify};
pub use paths::{default_bin_dir, resolve_bin_dir};
pub use place::{EXECUTABLE_MODE, place_binary, staging_path};
pub use self_check::{VERSION_FLAG, self_check};

/// Select the release target for a raw os/arch pair.
pub fn resolve_target<'a>(
    formula: &'a Formula,
    os: &str,
    arch: &str,
) -> Result<&'a ReleaseTarget, crate::error::InstallError> {
    formula.resolve(Platform::parse(os, arch)?)
}

/// Result of a completed install.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallReport {
    pub platform: Platform,
    pub url: String,
    pub path: PathBuf,
    /// First line of `unraidcli --version`, when the self-check ran.
    pub reported_version: Option<String>,
}

pub struct Installer<R: Runtime> {
    pub runtime: R,
    pub http: HttpClient,
    pub formula: Formula,
    pub detector: Box<dyn PlatformDetector>,
}

impl<R: Runtime> Installer<R> {
    pub fn new(config: Config<R>) -> Self {
        Self {
            runtime: config.runtime,
            http: config.http,
            formula: config.formula,
            detector: config.detector,
        }
    }

    pub fn target(&self) -> Result<&ReleaseTarget> {
        let platform = self.detector.detect()?;
        debug!("Resolved platform {}", platform);
        Ok(self.formula.resolve(platform)?)
    }

    /// Run the whole pipeline into `bin_dir`.
    #[tracing::instrument(skip(self, cleanup))]
    pub async fn install(
        &self,
        bin_dir: &Path,
        run_self_check: bool,
        cleanup: SharedCleanupContext,
    ) -> Result<InstallReport> {
        let target = self.target()?;
        println!(
            "   resolving {} {} for {}",
            self.formula.name, self.formula.version, target.platform
        );

        println!(" downloading {}", target.url);
        let bytes = fetch(&self.http, target).await?;

        println!("   verifying {}", target.digest);
        verify(&bytes, target)?;

        let installed = place_binary(&self.runtime, &bytes, bin_dir, &cleanup)?;
        println!("   installed {}", installed.display());

        let reported_version = if run_self_check {
            println!("     testing {} {}", BINARY_NAME, VERSION_FLAG);
            let reported = self_check(&self.runtime, &installed)?;
            debug!("Self-check passed: {}", reported);
            Some(reported)
        } else {
            None
        };

        Ok(InstallReport {
            platform: target.platform,
            url: target.url.clone(),
            path: installed,
            reported_version,
        })
    }
}

#[tracing::instrument(skip(runtime, options))]
pub async fn install<R: Runtime>(
    runtime: R,
    options: &GlobalOptions,
    bin_dir: Option<PathBuf>,
    run_self_check: bool,
) -> Result<()> {
    let config = Config::new(runtime, options)?;
    run_install(config, bin_dir, run_self_check).await?;
    Ok(())
}

#[tracing::instrument(skip(config))]
pub async fn run_install<R: Runtime>(
    config: Config<R>,
    bin_dir: Option<PathBuf>,
    run_self_check: bool,
) -> Result<InstallReport> {
    let bin_dir = resolve_bin_dir(&config.runtime, bin_dir)?;
    let installer = Installer::new(config);

    // Remove the staging file if the user interrupts the install
    let cleanup_ctx = cleanup::new_shared();
    let cleanup_ctx_clone = Arc::clone(&cleanup_ctx);
    let ctrl_c_handler = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, cleaning up...");
            if let Ok(ctx) = cleanup_ctx_clone.lock() {
                ctx.cleanup();
            }
            std::process::exit(130);
        }
    });

    let result = installer
        .install(&bin_dir, run_self_check, cleanup_ctx)
        .await;

    ctrl_c_handler.abort();

    let report = result?;
    println!(
        "{} {} installed to {}",
        installer.formula.name,
        installer.formula.version,
        report.path.display()
    );
    if let Some(version) = &report.reported_version {
        println!("  {}", version);
    }
    Ok(report)
}

/// Print the target selected for this platform.
pub fn resolve<R: Runtime>(runtime: R, options: &GlobalOptions) -> Result<()> {
    let installer = Installer::new(Config::new(runtime, options)?);
    let target = installer.target()?;

    println!("platform: {}", target.platform);
    println!("version:  {}", target.version);
    println!("url:      {}", target.url);
    println!("digest:   {}", target.digest);
    Ok(())
}

/// Verify a local artifact against the digest pinned for this platform.
pub fn verify_file<R: Runtime>(runtime: R, options: &GlobalOptions, file: &Path) -> Result<()> {
    let installer = Installer::new(Config::new(runtime, options)?);
    let target = installer.target()?;

    let bytes = installer
        .runtime
        .read(file)
        .with_context(|| format!("Failed to read {:?}", file))?;
    verify(&bytes, target)?;

    println!("{}: OK ({})", file.display(), target.digest);
    Ok(())
}

/// Run the self-check on an existing installation.
pub fn check<R: Runtime>(runtime: R, bin_dir: Option<PathBuf>) -> Result<()> {
    let bin_dir = resolve_bin_dir(&runtime, bin_dir)?;
    let installed = bin_dir.join(BINARY_NAME);
    if !runtime.exists(&installed) {
        anyhow::bail!(
            "{} is not installed in {}. Install it first with: unraidcli-install install",
            BINARY_NAME,
            bin_dir.display()
        );
    }

    let reported = self_check(&runtime, &installed)?;
    println!("{}: OK", installed.display());
    if !reported.is_empty() {
        println!("  {}", reported);
    }
    Ok(())
}

/// Print the formula and its target table.
pub fn info<R: Runtime>(runtime: R, options: &GlobalOptions, json: bool) -> Result<()> {
    let config = Config::new(runtime, options)?;
    let formula = &config.formula;

    if json {
        let out = serde_json::to_string_pretty(&formula.to_document())?;
        println!("{}", out);
        return Ok(());
    }

    println!("{} {}", formula.name, formula.version);
    if let Some(desc) = &formula.desc {
        println!("{}", desc);
    }
    if let Some(homepage) = &formula.homepage {
        println!("{}", homepage);
    }
    println!();
    for target in formula.targets() {
        println!("  {:<12} {}", target.platform.to_string(), target.url);
        println!("  {:<12} {}", "", target.digest);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InstallError;
    use crate::platform::{Arch, FixedPlatform, Os};
    use crate::runtime::{CommandOutput, MockRuntime};
    use crate::test_utils::{release_path, test_formula};
    use mockall::predicate::eq;
    use reqwest::Client;

    const ARTIFACT: &[u8] = b"\x7fELF fake unraidcli";

    fn linux_amd64() -> Platform {
        Platform::new(Os::Linux, Arch::Amd64)
    }

    fn config(runtime: MockRuntime, base: &str, digest_of: Option<&[u8]>) -> Config<MockRuntime> {
        Config {
            runtime,
            http: HttpClient::new(Client::new()).with_policy(crate::http::RetryPolicy::none()),
            formula: test_formula(base, digest_of),
            detector: Box::new(FixedPlatform(linux_amd64())),
        }
    }

    async fn serve_artifact(server: &mut mockito::ServerGuard, body: &[u8]) -> mockito::Mock {
        server
            .mock("GET", release_path(linux_amd64()).as_str())
            .with_status(200)
            .with_body(body)
            .create_async()
            .await
    }

    #[test]
    fn test_resolve_target_raw_identifiers() {
        let formula = Formula::builtin().unwrap();

        let target = resolve_target(&formula, "linux", "x86_64").unwrap();
        assert!(target.url.ends_with("unraidcli-linux-amd64"));

        assert!(matches!(
            resolve_target(&formula, "plan9", "amd64"),
            Err(InstallError::UnsupportedPlatform { .. })
        ));
    }

    #[tokio::test]
    async fn test_install_end_to_end_linux_amd64() {
        let mut server = mockito::Server::new_async().await;
        let mock = serve_artifact(&mut server, ARTIFACT).await;

        let bin_dir = PathBuf::from("/opt/bin");
        let staging = staging_path(&bin_dir);
        let installed = bin_dir.join("unraidcli");

        let mut runtime = MockRuntime::new();
        runtime.expect_is_dir().with(eq(bin_dir.clone())).returning(|_| true);
        runtime
            .expect_write()
            .with(eq(staging.clone()), eq(ARTIFACT.to_vec()))
            .times(1)
            .returning(|_, _| Ok(()));
        runtime
            .expect_set_permissions()
            .with(eq(staging.clone()), eq(EXECUTABLE_MODE))
            .returning(|_, _| Ok(()));
        runtime
            .expect_rename()
            .with(eq(staging.clone()), eq(installed.clone()))
            .times(1)
            .returning(|_, _| Ok(()));
        runtime
            .expect_run()
            .with(eq(installed.clone()), eq(vec!["--version".to_string()]))
            .times(1)
            .returning(|_, _| {
                Ok(CommandOutput {
                    code: Some(0),
                    stdout: "unraidcli version 0.1.0 (built unknown)\n".into(),
                    stderr: String::new(),
                })
            });

        let config = config(runtime, &server.url(), Some(ARTIFACT));
        let report = run_install(config, Some(bin_dir), true).await.unwrap();

        mock.assert_async().await;
        assert_eq!(report.platform, linux_amd64());
        assert!(report.url.ends_with("unraidcli-linux-amd64"));
        assert_eq!(report.path, installed);
        assert_eq!(
            report.reported_version.as_deref(),
            Some("unraidcli version 0.1.0 (built unknown)")
        );
    }

    #[tokio::test]
    async fn test_install_corrupted_download_writes_nothing() {
        let mut server = mockito::Server::new_async().await;
        let _mock = serve_artifact(&mut server, b"\x7fELF tampered unraidcli").await;

        // No expectations: any filesystem call would panic
        let runtime = MockRuntime::new();

        let config = config(runtime, &server.url(), Some(ARTIFACT));
        let err = run_install(config, Some(PathBuf::from("/opt/bin")), true)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::ChecksumMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_install_unpublished_digest_fails_closed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = serve_artifact(&mut server, ARTIFACT).await;

        let runtime = MockRuntime::new();

        let config = config(runtime, &server.url(), None);
        let err = run_install(config, Some(PathBuf::from("/opt/bin")), true)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::DigestNotYetPublished { .. })
        ));
    }

    #[tokio::test]
    async fn test_install_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", release_path(linux_amd64()).as_str())
            .with_status(404)
            .create_async()
            .await;

        let config = config(MockRuntime::new(), &server.url(), Some(ARTIFACT));
        let err = run_install(config, Some(PathBuf::from("/opt/bin")), true)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_install_self_check_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = serve_artifact(&mut server, ARTIFACT).await;

        let mut runtime = MockRuntime::new();
        runtime.expect_is_dir().returning(|_| true);
        runtime.expect_write().returning(|_, _| Ok(()));
        runtime.expect_set_permissions().returning(|_, _| Ok(()));
        runtime.expect_rename().returning(|_, _| Ok(()));
        runtime.expect_run().returning(|_, _| {
            Ok(CommandOutput {
                code: Some(1),
                ..Default::default()
            })
        });

        let config = config(runtime, &server.url(), Some(ARTIFACT));
        let err = run_install(config, Some(PathBuf::from("/opt/bin")), true)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::SelfCheckFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_install_without_self_check() {
        let mut server = mockito::Server::new_async().await;
        let _mock = serve_artifact(&mut server, ARTIFACT).await;

        let mut runtime = MockRuntime::new();
        runtime.expect_is_dir().returning(|_| true);
        runtime.expect_write().returning(|_, _| Ok(()));
        runtime.expect_set_permissions().returning(|_, _| Ok(()));
        runtime.expect_rename().returning(|_, _| Ok(()));

        let config = config(runtime, &server.url(), Some(ARTIFACT));
        let report = run_install(config, Some(PathBuf::from("/opt/bin")), false)
            .await
            .unwrap();

        assert_eq!(report.reported_version, None);
    }

    #[tokio::test]
    async fn test_install_unsupported_host() {
        let mut detector = crate::platform::MockPlatformDetector::new();
        detector.expect_detect().returning(|| {
            Err(InstallError::UnsupportedPlatform {
                os: "freebsd".into(),
                arch: "amd64".into(),
            })
        });

        let mut config = config(MockRuntime::new(), "https://example.com", Some(ARTIFACT));
        config.detector = Box::new(detector);

        let err = run_install(config, Some(PathBuf::from("/opt/bin")), true)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallError>(),
            Some(InstallError::UnsupportedPlatform { .. })
        ));
    }

    #[test]
    fn test_check_not_installed() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/opt/bin/unraidcli")))
            .returning(|_| false);

        let err = check(runtime, Some(PathBuf::from("/opt/bin"))).unwrap_err();
        assert!(err.to_string().contains("not installed"));
    }

    #[test]
    fn test_check_runs_version() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_run()
            .with(
                eq(PathBuf::from("/opt/bin/unraidcli")),
                eq(vec!["--version".to_string()]),
            )
            .times(1)
            .returning(|_, _| {
                Ok(CommandOutput {
                    code: Some(0),
                    stdout: "unraidcli version 0.1.0\n".into(),
                    stderr: String::new(),
                })
            });

        check(runtime, Some(PathBuf::from("/opt/bin"))).unwrap();
    }
}

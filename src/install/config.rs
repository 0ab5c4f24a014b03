use anyhow::Result;
use log::debug;
use reqwest::{
    Client,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use std::path::PathBuf;

use crate::{
    formula::Formula,
    http::HttpClient,
    platform::{FixedPlatform, HostPlatformDetector, Platform, PlatformDetector},
    runtime::Runtime,
};

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Formula document to use instead of the built-in one.
    pub formula: Option<PathBuf>,
    /// Override the detected operating system.
    pub os: Option<String>,
    /// Override the detected CPU architecture.
    pub arch: Option<String>,
}

pub struct Config<R: Runtime> {
    pub runtime: R,
    pub http: HttpClient,
    pub formula: Formula,
    pub detector: Box<dyn PlatformDetector>,
}

impl<R: Runtime> Config<R> {
    pub fn new(runtime: R, options: &GlobalOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Ok(token) = runtime.env_var("GITHUB_TOKEN") {
            let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))?;
            auth_value.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth_value);
            debug!("Using GITHUB_TOKEN for authentication");
        }

        let client = Client::builder()
            .user_agent("unraidcli-install")
            .default_headers(headers)
            .build()?;

        let formula = match &options.formula {
            Some(path) => {
                debug!("Loading formula from {:?}", path);
                Formula::load(&runtime, path)?
            }
            None => Formula::builtin()?,
        };

        let detector = platform_detector(options)?;

        Ok(Self {
            runtime,
            http: HttpClient::new(client),
            formula,
            detector,
        })
    }
}

/// Host detection, unless the user pinned an os and/or arch.
fn platform_detector(options: &GlobalOptions) -> Result<Box<dyn PlatformDetector>> {
    if options.os.is_none() && options.arch.is_none() {
        return Ok(Box::new(HostPlatformDetector));
    }

    let os = options.os.as_deref().unwrap_or(std::env::consts::OS);
    let arch = options.arch.as_deref().unwrap_or(std::env::consts::ARCH);
    let platform = Platform::parse(os, arch)?;
    debug!("Using platform override {}", platform);
    Ok(Box::new(FixedPlatform(platform)))
}

use log::info;

use crate::error::InstallError;
use crate::formula::ReleaseTarget;
use crate::http::{HttpClient, NonRetryableError};

/// Download the artifact for `target` into memory.
#[tracing::instrument(skip(http, target), fields(url = %target.url))]
pub async fn fetch(http: &HttpClient, target: &ReleaseTarget) -> Result<Vec<u8>, InstallError> {
    info!("Downloading {}...", target.url);

    let bytes = http.get_bytes(&target.url).await.map_err(|e| {
        match e.downcast_ref::<NonRetryableError>() {
            Some(NonRetryableError::NotFound) => InstallError::NotFound {
                url: target.url.clone(),
            },
            _ => InstallError::NetworkError {
                url: target.url.clone(),
                reason: format!("{:#}", e),
            },
        }
    })?;

    info!("Download complete ({} bytes).", bytes.len());
    Ok(bytes)
}

/// Check `bytes` against the digest pinned for `target`.
#[tracing::instrument(skip(bytes, target), fields(url = %target.url))]
pub fn verify(bytes: &[u8], target: &ReleaseTarget) -> Result<(), InstallError> {
    target.digest.verify(bytes, &target.url)
}

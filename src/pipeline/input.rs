//! Attachment reading: a user-supplied path or URL → raw bytes.
//!
//! The pipeline works on in-memory uploads (pdfium loads from a byte slice,
//! `image` decodes from memory), so nothing is staged on disk. Content
//! validation is left to the stage that understands the format.

use crate::error::ChemistError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read an attachment from a local path or an `http(s)://` URL.
pub async fn read_attachment(source: &str, timeout_secs: u64) -> Result<Vec<u8>, ChemistError> {
    if is_url(source) {
        download_url(source, timeout_secs).await
    } else {
        read_local(source).await
    }
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, ChemistError> {
    let path = PathBuf::from(path_str);

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read {} bytes from {}", bytes.len(), path.display());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ChemistError::PermissionDenied { path })
        }
        Err(_) => Err(ChemistError::FileNotFound { path }),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, ChemistError> {
    info!("Downloading attachment from: {}", url);

    let failed = |reason: String| ChemistError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ChemistError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            ChemistError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

//! Streaming HTTP downloads with progress reporting.

use std::path::Path;

use anyhow::{Context, Result, bail};
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Progress callback for downloads: `(downloaded_bytes, total_bytes)`.
///
/// `total_bytes` is 0 when the server sent no content length.
pub type DownloadProgress<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

const USER_AGENT: &str = concat!("reviewlens/", env!("CARGO_PKG_VERSION"));

/// Download `url` to `dest`, creating parent directories as needed.
///
/// A partially written file is removed on failure.
pub async fn download_to_file(
    client: &Client,
    url: &str,
    dest: &Path,
    progress: DownloadProgress<'_>,
) -> Result<()> {
    debug!(%url, dest = %dest.display(), "Starting download");

    let response = client
        .get(url)
        .header("User-Agent", USER_AGENT)
        .send()
        .await
        .with_context(|| format!("Failed to start download from {url}"))?;

    if !response.status().is_success() {
        bail!("Download failed: HTTP {}", response.status());
    }

    let total_size = response.content_length().unwrap_or(0);

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .await
            .context("Failed to create download directory")?;
    }

    let result = async {
        let mut file = File::create(dest)
            .await
            .context("Failed to create download file")?;

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Error reading download stream")?;
            file.write_all(&chunk)
                .await
                .context("Error writing to download file")?;
            downloaded += chunk.len() as u64;
            progress(downloaded, total_size);
        }

        file.flush().await.context("Error flushing download file")?;
        Ok(())
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(dest).await;
    }
    result
}

/// Percentage for a download callback, 0 when the total is unknown.
pub fn percent(downloaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    u8::try_from((downloaded.min(total) * 100) / total).unwrap_or(100)
}

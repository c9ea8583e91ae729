//! Streaming download of generated clips.
//!
//! Provider outputs are plain HTTPS URLs; the body is streamed straight to
//! disk so large clips never sit in memory.

use async_trait::async_trait;
use futures_util::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Default request timeout for a single clip download.
const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Fetches a remote clip into a local file.
#[async_trait]
pub trait ClipDownloader: Send + Sync {
    async fn download(&self, url: &str, dest: &Path) -> MediaResult<()>;
}

/// reqwest-backed downloader.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new() -> MediaResult<Self> {
        Self::with_timeout(DEFAULT_DOWNLOAD_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> MediaResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MediaError::download_failed(format!("HTTP client init: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ClipDownloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> MediaResult<()> {
        debug!(url, dest = ?dest, "Downloading clip");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::download_failed(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::download_failed(format!(
                "{} returned HTTP {}",
                url, status
            )));
        }

        let mut file = File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| MediaError::download_failed(e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            return Err(MediaError::download_failed(format!("{} returned an empty body", url)));
        }

        info!(url, bytes = written, "Clip downloaded");
        Ok(())
    }
}

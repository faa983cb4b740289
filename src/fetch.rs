use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::path::Path;
use std::time::Duration;
use tokio::fs as async_fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use crate::config::DownloadConfig;
use crate::error::{MutecutError, Result};

/// Fetches a remote video into a local file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `url` into `dest`, returning the number of bytes written.
    /// A 404 yields [`MutecutError::DownloadNotFound`]; any other failure
    /// yields [`MutecutError::DownloadFailed`].
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client })
    }

    async fn stream_to_file(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self.client.get(url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(MutecutError::DownloadNotFound {
                    url: url.to_string(),
                });
            }
            status if !status.is_success() => {
                return Err(MutecutError::DownloadFailed(format!("HTTP {}", status)));
            }
            _ => {}
        }

        let content_length = response.content_length().unwrap_or(0);
        let mut file = BufWriter::new(async_fs::File::create(dest).await?);
        let mut downloaded: u64 = 0;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            if content_length > 0 {
                debug!(
                    "Download progress: {:.1}%",
                    downloaded as f64 / content_length as f64 * 100.0
                );
            }
        }

        file.flush().await?;
        Ok(downloaded)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        info!("Downloading {} -> {}", url, dest.display());

        match self.stream_to_file(url, dest).await {
            Ok(bytes) => {
                info!("Downloaded: {:.2}MB", bytes as f64 / (1024.0 * 1024.0));
                Ok(bytes)
            }
            Err(e) => {
                let _ = async_fs::remove_file(dest).await;
                Err(match e {
                    MutecutError::DownloadNotFound { .. } | MutecutError::DownloadFailed(_) => e,
                    other => MutecutError::DownloadFailed(format!(
                        "{}. Please ensure the URL points to a direct video file, not an API endpoint.",
                        other
                    )),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_unreachable_host_is_download_failure() {
        let fetcher = HttpFetcher::new(&Config::default().download).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("video.mp4");

        let result = fetcher.fetch("http://127.0.0.1:9/video.mp4", &dest).await;

        assert!(matches!(result, Err(MutecutError::DownloadFailed(_))));
        assert!(!dest.exists());
    }
}

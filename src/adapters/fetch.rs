//! Remote video download over HTTP.

use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::VideoFetcher;
use crate::error::{IngestError, IngestResult};

/// Streams a remote video to disk chunk by chunk
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> IngestResult<u64> {
        debug!(url, destination = %destination.display(), "Requesting video");

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| IngestError::fetch(format!("Failed to download {}: {}", url, e)))?;

        let mut file = tokio::fs::File::create(destination).await.map_err(|e| {
            IngestError::fetch(format!(
                "Failed to create {}: {}",
                destination.display(),
                e
            ))
        })?;

        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| IngestError::fetch(format!("Transfer from {} interrupted: {}", url, e)))?
        {
            file.write_all(&chunk).await.map_err(|e| {
                IngestError::fetch(format!(
                    "Failed to write {}: {}",
                    destination.display(),
                    e
                ))
            })?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| IngestError::fetch(format!("Failed to flush {}: {}", destination.display(), e)))?;

        info!(bytes = written, "Video downloaded");
        Ok(written)
    }
}

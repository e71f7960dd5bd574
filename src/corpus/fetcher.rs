//! Corpus acquisition from a remote bulk-storage location
//!
//! When the local corpus directory is absent the facade asks a fetcher to
//! populate it before retrying the load exactly once. The HTTP fetcher
//! expects the bulk location to serve `manifest.json` (a JSON array of file
//! names) next to the files themselves.

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use crate::errors::CharterQaError;
use crate::errors::Result;

/// Collaborator that populates a local corpus directory from external storage.
#[async_trait]
pub trait CorpusFetcher: Send + Sync {
    /// Download the corpus into `dir`, creating the directory if needed.
    async fn fetch(&self, dir: &Path) -> Result<()>;
}

/// Fetches corpus files over HTTP from a bulk-storage base URL.
pub struct HttpCorpusFetcher {
    base_url: String,
    client: Client,
}

impl HttpCorpusFetcher {
    /// Create a new fetcher for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| CharterQaError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CharterQaError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(CharterQaError::Upstream(format!(
                "bulk storage returned {status} for {url}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| CharterQaError::Http(e.to_string()))
    }
}

#[async_trait]
impl CorpusFetcher for HttpCorpusFetcher {
    async fn fetch(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let manifest_url = format!("{}/manifest.json", self.base_url);
        info!("Fetching corpus manifest from {manifest_url}");

        let manifest = self.fetch_text(&manifest_url).await?;
        let files: Vec<String> = serde_json::from_str(&manifest)?;

        for name in &files {
            // Manifest entries are plain file names; anything path-like is refused
            if name.contains('/') || name.contains('\\') || name.contains("..") {
                return Err(CharterQaError::CorpusUnavailable(format!(
                    "manifest entry is not a plain file name: {name}"
                )));
            }

            let url = format!("{}/{name}", self.base_url);
            let content = self.fetch_text(&url).await?;
            let target: PathBuf = dir.join(name);
            std::fs::write(&target, content)?;
            info!("Downloaded corpus file {}", target.display());
        }

        info!("Corpus acquisition complete: {} files", files.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_builds() {
        let fetcher = HttpCorpusFetcher::new("https://storage.example.com/charter");
        assert!(fetcher.is_ok());
    }
}

//! HTTP document retrieval for the runtime table refresh.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::traits::{DocumentFetcher, ProviderError};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// [`DocumentFetcher`] backed by `reqwest`.
pub struct HttpDocumentFetcher {
    client: reqwest::Client,
}

impl HttpDocumentFetcher {
    pub fn new() -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!("lambda-harvester/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Service(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ProviderError::Service(format!("GET {} failed: {}", url, e)))?;

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Service(format!("reading {} failed: {}", url, e)))?;
        debug!(url, bytes = body.len(), "Fetched document");
        Ok(body)
    }
}

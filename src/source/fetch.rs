//! Network access for remote sources.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::{PipelineError, Result};

/// Byte fetcher for remote sources.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the full body. Any failure is `SourceUnavailable`.
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>>;
}

/// `reqwest` client with rustls.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| PipelineError::unavailable("http client", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        let unavailable = |e: reqwest::Error| PipelineError::unavailable(url.as_str(), e);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(unavailable)?
            .error_for_status()
            .map_err(unavailable)?;
        let body = response.bytes().await.map_err(unavailable)?;
        Ok(body.to_vec())
    }
}

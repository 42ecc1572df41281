use crate::core::error::FetchError;
use async_trait::async_trait;
use std::time::Duration;

/// Transport seam between a collector and the network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url`, returning the raw body of a 2xx response.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cloud-status/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpFetcher { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(FetchError::Transport(format!(
                "upstream returned {}",
                resp.status()
            )));
        }
        let body = resp.bytes().await?;
        Ok(body.to_vec())
    }
}

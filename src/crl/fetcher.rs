use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::time::timeout;
use tracing::{debug, info};
use url::Url;

use super::errors::{CrlError, CrlResult};

/// Retrieves CRL bytes from a distribution point.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CrlFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> CrlResult<Vec<u8>>;
}

/// [`CrlFetcher`] over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpCrlFetcher {
    client: Client,
    request_timeout: Duration,
}

impl HttpCrlFetcher {
    /// Returns an error if the HTTP client cannot be initialized
    pub fn new() -> CrlResult<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Returns an error if the HTTP client cannot be initialized
    pub fn with_timeout(request_timeout: Duration) -> CrlResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("vds-checker/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            request_timeout,
        })
    }
}

#[async_trait]
impl CrlFetcher for HttpCrlFetcher {
    async fn fetch(&self, url: &Url) -> CrlResult<Vec<u8>> {
        info!("Fetching CRL from: {url}");

        let response = match timeout(self.request_timeout, self.client.get(url.clone()).send()).await
        {
            Ok(result) => result?,
            Err(_) => return Err(CrlError::Timeout),
        };

        if !response.status().is_success() {
            return Err(CrlError::HttpStatus {
                status: response.status(),
                url: url.to_string(),
            });
        }

        let body = match timeout(self.request_timeout, response.bytes()).await {
            Ok(result) => result?,
            Err(_) => return Err(CrlError::Timeout),
        };
        if body.is_empty() {
            return Err(CrlError::EmptyResponse {
                url: url.to_string(),
            });
        }
        debug!("Fetched {} bytes from {url}", body.len());

        Ok(body.to_vec())
    }
}

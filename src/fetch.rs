use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::config::FetcherConfig;
use crate::{AppError, Result};

/// Fetch collaborator: resolves a product locator to raw page markup.
/// Transport failures and timeouts surface as `AppError::Fetch`.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .user_agent(config.user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let fetch_error = |e: reqwest::Error| AppError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(fetch_error)?;
        let response = response.error_for_status().map_err(fetch_error)?;
        response.text().await.map_err(fetch_error)
    }
}

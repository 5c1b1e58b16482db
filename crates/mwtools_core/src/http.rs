use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;

use crate::config::WikiConfig;

/// One GET response, after redirects.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub final_url: String,
    pub body: String,
}

impl FetchedPage {
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking GET transport. Implementations must follow redirects and report the
/// final URL; a non-2xx status is returned, not raised.
pub trait PageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

pub struct HttpClient {
    client: Client,
    user_agent: String,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
        })
    }

    pub fn from_config(config: &WikiConfig) -> Result<Self> {
        Self::new(
            &config.user_agent(),
            Duration::from_millis(config.timeout_ms()),
        )
    }
}

impl PageFetcher for HttpClient {
    fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", self.user_agent.clone())
            .header("Accept", "text/html, application/json;q=0.9, */*;q=0.1")
            .send()
            .with_context(|| format!("failed to fetch {url}"))?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response
            .text()
            .with_context(|| format!("failed to read response body from {url}"))?;
        tracing::debug!(%url, status, %final_url, "fetched");
        Ok(FetchedPage {
            status,
            final_url,
            body,
        })
    }
}

//! Keepalive traffic to the sandbox's public URL.
//!
//! Providers shut sandboxes down after a stretch without inbound HTTP, so a
//! keepalive run ends with one request to the dev server.

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL};
use std::time::Duration;
use tracing::debug;

/// Marks keeper traffic in the sandbox's access logs.
pub(crate) const KEEPALIVE_HEADER: &str = "x-sandbox-keepalive";

#[derive(Debug, Clone)]
pub(crate) struct TrafficGenerator {
    client: reqwest::Client,
}

impl TrafficGenerator {
    /// Builds a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(KEEPALIVE_HEADER, HeaderValue::from_static("1"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }

    /// Sends one GET to `url`. Never fails; returns whether any response came back.
    pub async fn ping(&self, url: &str) -> bool {
        debug!("Sending keepalive request to {}", url);
        let sent = self.client.get(url).send().await;
        match sent {
            Ok(response) => {
                debug!("Keepalive request answered with {}", response.status());
                true
            }
            Err(e) => {
                debug!("Keepalive request to {} failed: {}", url, e);
                false
            }
        }
    }
}

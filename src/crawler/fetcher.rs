//! HTTP fetcher implementation
//!
//! A single GET per call with a bounded timeout and a bounded redirect chain.
//! Transport failures are folded into the outcome instead of being returned
//! as errors, so the crawl loop can record them and move on.

use crate::config::FetcherConfig;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Result of a fetch operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// HTTP status code, or `TRANSPORT_FAILURE` when no response arrived
    pub status: u16,

    /// Response body, present for any status that delivered one
    pub body: Option<String>,
}

impl FetchOutcome {
    /// Status reported when the request never produced a readable response
    pub const TRANSPORT_FAILURE: u16 = 0;

    fn transport_failure() -> Self {
        Self {
            status: Self::TRANSPORT_FAILURE,
            body: None,
        }
    }

    /// Returns true when the page should be stored and parsed
    pub fn is_success(&self) -> bool {
        self.status == 200 && self.body.is_some()
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - Timeout, redirect limit and user agent
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs))
        .redirect(Policy::limited(config.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages over HTTP
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_http_client(config)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Fetches a URL
    ///
    /// Never fails: timeouts, DNS errors, refused connections, TLS errors,
    /// exhausted redirect chains and unreadable bodies all yield
    /// `FetchOutcome::TRANSPORT_FAILURE` with no body.
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Fetch of {} failed: {}", url, e);
                return FetchOutcome::transport_failure();
            }
        };

        let status = response.status().as_u16();
        if response.url().as_str() != url {
            tracing::trace!("{} redirected to {}", url, response.url());
        }

        match response.text().await {
            Ok(body) => FetchOutcome {
                status,
                body: Some(body),
            },
            Err(e) => {
                tracing::debug!("Reading body of {} failed: {}", url, e);
                FetchOutcome::transport_failure()
            }
        }
    }
}

//! HTTP fetching of article locators.
//!
//! One request per locator, no retries. Redirect and timeout policy come from
//! the `[fetch]` config section and are enforced by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use kindle_voz_shared::{FetchConfig, Result, VozError};

/// User-Agent string for fetch requests.
const USER_AGENT: &str = concat!("kindle-voz/", env!("CARGO_PKG_VERSION"));

/// Raw response for one locator.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// The locator as requested.
    pub locator: String,
    /// Final URL after redirects.
    pub url: Url,
    /// HTTP status code.
    pub status: u16,
    /// Response body decoded as text.
    pub body: String,
}

/// Capability that turns a locator into a raw document.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `locator`. Every failure is a [`VozError::Fetch`].
    async fn fetch(&self, locator: &str) -> Result<FetchedDocument>;
}

/// `reqwest`-backed fetcher.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher from the `[fetch]` config section.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let user_agent = config.user_agent.as_deref().unwrap_or(USER_AGENT);
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VozError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, locator: &str) -> Result<FetchedDocument> {
        let url = parse_locator(locator)?;
        debug!(%url, "fetching");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| VozError::fetch(locator, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VozError::fetch(locator, format!("HTTP {status}")));
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| VozError::fetch(locator, format!("body read failed: {e}")))?;

        debug!(status = status.as_u16(), bytes = body.len(), "fetched");

        Ok(FetchedDocument {
            locator: locator.to_string(),
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

/// Parse a source-list line into an http(s) URL.
pub fn parse_locator(locator: &str) -> Result<Url> {
    let url = Url::parse(locator)
        .map_err(|e| VozError::fetch(locator, format!("invalid URL: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(VozError::fetch(
            locator,
            format!("unsupported scheme '{other}'"),
        )),
    }
}

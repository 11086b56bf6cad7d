//! Page fetching
//!
//! The loader only needs raw page bytes for a page id. [`PageFetcher`] is the
//! seam between the worker and the network; [`HttpFetcher`] is the reqwest
//! implementation used by the binary.

use crate::config::FetchConfig;
use crate::page::PageId;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors produced while fetching a page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Empty response body for {url}")]
    Empty { url: String },

    #[error("Invalid page URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Source of raw teletext page bytes
pub trait PageFetcher: Send + Sync + 'static {
    /// Fetches the undecoded page for `page_id`
    ///
    /// An empty body is an error; the decoder never sees zero bytes.
    fn fetch(&self, page_id: &PageId) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages with `GET {base_url}{page_id}`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = build_http_client(config).map_err(|source| FetchError::Http {
            url: config.base_url.clone(),
            source,
        })?;

        // Fail early on a base URL that can never produce a valid page URL
        Url::parse(&config.base_url)?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Returns the URL a page is fetched from
    pub fn page_url(&self, page_id: &PageId) -> Result<Url, FetchError> {
        Ok(Url::parse(&format!("{}{}", self.base_url, page_id))?)
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, page_id: &PageId) -> Result<Vec<u8>, FetchError> {
        let url = self.page_url(page_id)?;
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;

        if body.is_empty() {
            return Err(FetchError::Empty {
                url: url.to_string(),
            });
        }

        Ok(body.to_vec())
    }
}

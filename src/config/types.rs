use crate::decoder::DecoderOptions;
use crate::page::ExpiryPolicy;
use serde::Deserialize;

/// Main configuration structure
///
/// Every section is optional; an empty file yields [`Config::default`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub loader: LoaderConfig,
    pub fetch: FetchConfig,
    pub decoder: DecoderConfig,
}

/// Cache and expiry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Maximum number of decoded pages kept in memory
    #[serde(rename = "cache-capacity")]
    pub cache_capacity: usize,

    /// Page ids starting with this prefix use the volatile TTL
    #[serde(rename = "volatile-prefix")]
    pub volatile_prefix: String,

    /// TTL for volatile (ticker-like) pages, in seconds
    #[serde(rename = "volatile-ttl-secs")]
    pub volatile_ttl_secs: u64,

    /// TTL for all other pages, in seconds
    #[serde(rename = "default-ttl-secs")]
    pub default_ttl_secs: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            cache_capacity: crate::cache::DEFAULT_CAPACITY,
            volatile_prefix: "8".to_string(),
            volatile_ttl_secs: 60,
            default_ttl_secs: 300,
        }
    }
}

impl LoaderConfig {
    /// Builds the expiry policy stamped onto decoded pages
    pub fn expiry_policy(&self) -> ExpiryPolicy {
        ExpiryPolicy {
            volatile_prefix: self.volatile_prefix.clone(),
            volatile_ttl: chrono::Duration::seconds(self.volatile_ttl_secs as i64),
            default_ttl: chrono::Duration::seconds(self.default_ttl_secs as i64),
        }
    }
}

/// HTTP fetch configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// URL prefix the page id is appended to
    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Total request timeout, in seconds
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "http://teletekst-data.nos.nl/page/".to_string(),
            user_agent: format!("{}/{}", crate::NAME, crate::VERSION),
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// Decoder configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Skip the status row that follows the `<pre>` marker
    #[serde(rename = "skip-header-row")]
    pub skip_header_row: bool,
}

impl DecoderConfig {
    pub fn options(&self) -> DecoderOptions {
        DecoderOptions {
            skip_header_row: self.skip_header_row,
        }
    }
}

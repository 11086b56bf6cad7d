//! Teletekst: a teletext page decoder and loader
//!
//! This crate turns raw teletext pages into positioned markup with page links,
//! and loads them through a priority-ordered, cached scheduler that preloads
//! the pages a reader is likely to visit next.

pub mod cache;
pub mod config;
pub mod decoder;
pub mod loader;
pub mod page;

use thiserror::Error;

/// Crate name, used in the default user agent
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Crate version, used in the default user agent
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Main error type for teletekst operations
#[derive(Debug, Error)]
pub enum TeletextError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Decode error: {0}")]
    Decode(#[from] decoder::DecodeError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] loader::FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No tokio runtime available to run the page loader")]
    NoRuntime,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for teletekst operations
pub type Result<T> = std::result::Result<T, TeletextError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use decoder::{DecodeError, TeletextDecoder};
pub use loader::{HttpFetcher, LoadPriority, PageFetcher, PageLoader};
pub use page::{PageEntity, PageId};

//! Configuration module
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use teletekst::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("teletekst.toml")).unwrap();
//! println!("Fetching pages from: {}", config.fetch.base_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, DecoderConfig, FetchConfig, LoaderConfig};

// Re-export parser functions
pub use parser::{load_config, parse_config};

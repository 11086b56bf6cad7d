use crate::config::types::{Config, FetchConfig, LoaderConfig};
use crate::ConfigError;
use url::Url;

/// Largest accepted cache capacity
const MAX_CACHE_CAPACITY: usize = 10_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_loader_config(&config.loader)?;
    validate_fetch_config(&config.fetch)?;
    Ok(())
}

/// Validates cache and expiry settings
fn validate_loader_config(config: &LoaderConfig) -> Result<(), ConfigError> {
    if config.cache_capacity < 1 || config.cache_capacity > MAX_CACHE_CAPACITY {
        return Err(ConfigError::Validation(format!(
            "cache_capacity must be between 1 and {}, got {}",
            MAX_CACHE_CAPACITY, config.cache_capacity
        )));
    }

    if config.volatile_prefix.len() != 1
        || !config.volatile_prefix.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ConfigError::Validation(format!(
            "volatile_prefix must be a single digit, got '{}'",
            config.volatile_prefix
        )));
    }

    if config.volatile_ttl_secs == 0 || config.default_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "TTLs must be greater than zero".to_string(),
        ));
    }

    if config.volatile_ttl_secs > config.default_ttl_secs {
        return Err(ConfigError::Validation(format!(
            "volatile_ttl_secs ({}) must not exceed default_ttl_secs ({})",
            config.volatile_ttl_secs, config.default_ttl_secs
        )));
    }

    Ok(())
}

/// Validates HTTP fetch settings
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got {}",
            url.scheme()
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeouts must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

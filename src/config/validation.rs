use crate::config::types::{AuthEntry, CheckerConfig, Config, UserAgentConfig};
use crate::url::ProxyConfig;
use crate::ConfigError;
use regex::Regex;
use std::collections::HashMap;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_checker_config(&config.checker)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_proxies(&config.proxy)?;
    validate_auth_entries(&config.auth)?;
    Ok(())
}

/// Validates checker configuration
fn validate_checker_config(config: &CheckerConfig) -> Result<(), ConfigError> {
    if config.max_redirects < 1 || config.max_redirects > 50 {
        return Err(ConfigError::Validation(format!(
            "max_redirects must be between 1 and 50, got {}",
            config.max_redirects
        )));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "connect_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.robots_ttl_hours == Some(0) {
        return Err(ConfigError::Validation(
            "robots_ttl_hours must be >= 1 when set".to_string(),
        ));
    }

    for pattern in &config.head_hostile_hosts {
        validate_regex(pattern)?;
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Crawler name doubles as the robots.txt product token
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only letters, digits, '-' and '_', got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates the per-scheme proxy map
fn validate_proxies(proxies: &HashMap<String, String>) -> Result<(), ConfigError> {
    for (scheme, proxy) in proxies {
        if scheme != "http" && scheme != "https" {
            return Err(ConfigError::Validation(format!(
                "Proxy configured for unsupported scheme '{}'",
                scheme
            )));
        }

        ProxyConfig::parse(proxy).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid proxy for {}: {}", scheme, e))
        })?;
    }
    Ok(())
}

/// Validates authentication entries
fn validate_auth_entries(entries: &[AuthEntry]) -> Result<(), ConfigError> {
    for entry in entries {
        validate_regex(&entry.pattern)?;

        if entry.user.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Auth entry '{}' has an empty user",
                entry.pattern
            )));
        }
    }
    Ok(())
}

fn validate_regex(pattern: &str) -> Result<(), ConfigError> {
    Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

//! Linkprobe: an HTTP link validation engine
//!
//! This crate checks one URL at a time the way a link checker does: it asks
//! robots.txt for permission, probes the resource with HEAD (falling back to
//! GET for servers that mishandle HEAD), follows and records redirects, retries
//! once with credentials on 401, and classifies the outcome as valid, warning
//! or error. Response bodies are only downloaded when a caller asks for them.

pub mod checker;
pub mod config;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Errors that abort a check
///
/// Policy denials, redirect loops and overflows, missing credentials and
/// error statuses are not errors here: they end the check normally and are
/// reported through [`IssueKind`] on the [`CheckResult`]. Only setup failures
/// and transport faults that no fallback recovers escape
/// [`checker::UrlCheck::check`].
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("Unsupported URL scheme: {scheme}")]
    Protocol { scheme: String },

    #[error("Connection error for {url}: {source}")]
    Connection { url: String, source: reqwest::Error },

    #[error("Malformed response from {url}: {message}")]
    MalformedResponse { url: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),
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

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for check operations
pub type Result<T> = std::result::Result<T, CheckError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use checker::{CheckTask, Checker, HttpUrlCheck, UrlCheck};
pub use config::Config;
pub use state::{CheckResult, Classification, IssueKind};

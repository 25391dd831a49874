//! URL handling module for Linkprobe
//!
//! This module provides URL parsing and normalization for checks, redirect
//! target resolution, Basic credentials, and proxy specifications.

mod auth;
mod normalize;
mod proxy;

pub use auth::{basic_auth, userinfo_auth};
pub use normalize::{is_http_scheme, join_location, normalize_url, parse_check_url, ParsedCheckUrl};
pub use proxy::ProxyConfig;

use ::url::Url;

/// Builds the robots.txt URL for the host serving `url`
///
/// # Examples
///
/// ```
/// use linkprobe::url::robots_txt_url;
/// use url::Url;
///
/// let url = Url::parse("http://example.com:8080/a/b?c").unwrap();
/// assert_eq!(robots_txt_url(&url), "http://example.com:8080/robots.txt");
/// ```
pub fn robots_txt_url(url: &Url) -> String {
    format!("{}://{}/robots.txt", url.scheme(), host_with_port(url))
}

/// The `host[:port]` authority of a URL, without user-info
pub fn host_with_port(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

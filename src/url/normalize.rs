use crate::{UrlError, UrlResult};
use url::Url;

/// A URL accepted for checking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCheckUrl {
    /// The parsed and normalized URL
    pub url: Url,
    /// The raw URL had no path; the parser substituted `/`
    pub path_was_empty: bool,
}

/// Parses a URL that is about to be checked over HTTP
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Require the `http` or `https` scheme and a host
/// 3. Lowercase scheme and host, drop the default port, resolve dot segments
///    (all done by the `url` parser)
/// 4. Remove empty query (`?`) and empty fragment (`#`) markers
///
/// Unlike crawl-frontier normalization the fragment is kept: the check may
/// need to strip it later when the server rejects anchors.
///
/// # Examples
///
/// ```
/// use linkprobe::url::parse_check_url;
///
/// let parsed = parse_check_url("HTTP://Example.COM:80").unwrap();
/// assert_eq!(parsed.url.as_str(), "http://example.com/");
/// assert!(parsed.path_was_empty);
/// ```
pub fn parse_check_url(raw: &str) -> UrlResult<ParsedCheckUrl> {
    let url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if !is_http_scheme(url.scheme()) {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    Ok(ParsedCheckUrl {
        url: normalize_url(url),
        path_was_empty: raw_path_is_empty(raw.trim()),
    })
}

/// Removes empty query and fragment markers from an already parsed URL
pub fn normalize_url(mut url: Url) -> Url {
    if url.query() == Some("") {
        url.set_query(None);
    }
    if url.fragment() == Some("") {
        url.set_fragment(None);
    }
    url
}

/// Resolves a `Location` header value against the URL that produced it
pub fn join_location(base: &Url, location: &str) -> UrlResult<Url> {
    let joined = base
        .join(location.trim())
        .map_err(|e| UrlError::Malformed(format!("Bad redirect target '{}': {}", location, e)))?;
    Ok(normalize_url(joined))
}

/// True for the schemes an HTTP check can handle itself
pub fn is_http_scheme(scheme: &str) -> bool {
    scheme == "http" || scheme == "https"
}

/// Checks whether the raw URL string carries no path after its authority
fn raw_path_is_empty(raw: &str) -> bool {
    let Some((_, rest)) = raw.split_once("://") else {
        return false;
    };
    let after_authority = rest
        .find(|c: char| c == '/' || c == '?' || c == '#')
        .map(|idx| &rest[idx..])
        .unwrap_or("");
    !after_authority.starts_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_host_and_scheme() {
        let parsed = parse_check_url("HTTP://EXAMPLE.COM/Page").unwrap();
        assert_eq!(parsed.url.as_str(), "http://example.com/Page");
        assert!(!parsed.path_was_empty);
    }

    #[test]
    fn test_default_port_removed() {
        let parsed = parse_check_url("https://example.com:443/a").unwrap();
        assert_eq!(parsed.url.as_str(), "https://example.com/a");
    }

    #[test]
    fn test_keeps_fragment() {
        let parsed = parse_check_url("http://example.com/page#section").unwrap();
        assert_eq!(parsed.url.fragment(), Some("section"));
    }

    #[test]
    fn test_empty_markers_removed() {
        let parsed = parse_check_url("http://example.com/page?#").unwrap();
        assert_eq!(parsed.url.as_str(), "http://example.com/page");
    }

    #[test]
    fn test_empty_path_detected() {
        assert!(parse_check_url("http://example.com").unwrap().path_was_empty);
        assert!(parse_check_url("http://example.com?q=1").unwrap().path_was_empty);
        assert!(!parse_check_url("http://example.com/").unwrap().path_was_empty);
    }

    #[test]
    fn test_dot_segments_resolved() {
        let parsed = parse_check_url("http://example.com/a/../b/./c").unwrap();
        assert_eq!(parsed.url.as_str(), "http://example.com/b/c");
    }

    #[test]
    fn test_invalid_scheme() {
        let result = parse_check_url("ftp://example.com/file");
        assert!(matches!(result.unwrap_err(), UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_malformed_url() {
        assert!(matches!(
            parse_check_url("not a url").unwrap_err(),
            UrlError::Parse(_)
        ));
    }

    #[test]
    fn test_join_relative_location() {
        let base = Url::parse("http://example.com/dir/page").unwrap();
        let joined = join_location(&base, "../other?").unwrap();
        assert_eq!(joined.as_str(), "http://example.com/other");
    }

    #[test]
    fn test_join_absolute_location() {
        let base = Url::parse("http://example.com/dir/page").unwrap();
        let joined = join_location(&base, "ftp://files.example.com/x").unwrap();
        assert_eq!(joined.scheme(), "ftp");
    }
}

/// Per-check state owned by one HTTP check session
///
/// The session drives these values through explicit transitions
/// (`downgrade_to_get`, `strip_anchor`, ...) instead of toggling loose flags.
use crate::state::CheckResult;
use crate::url::ProxyConfig;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use std::fmt;
use std::time::Duration;
use url::Url;

/// HTTP method used for a physical request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Head,
    Get,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Head => "HEAD",
            Self::Get => "GET",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Head => reqwest::Method::HEAD,
            Method::Get => reqwest::Method::GET,
        }
    }
}

/// Recovery paths that may each fire only once per check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fallback {
    /// Empty or malformed status line answered to HEAD
    BadStatusLine,
    /// Redirect loop or too many hops while using HEAD
    RedirectOverflow,
    /// Error status answered to HEAD
    ClientError,
    /// Server cannot report the MIME type for HEAD
    MimeSniff,
    /// Error status for a URL with a fragment
    StripAnchor,
    /// Retry with credentials after 401
    Credentials,
}

/// URLs visited while resolving one chain of redirects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTrail {
    urls: Vec<String>,
}

impl RedirectTrail {
    pub fn new(start: &Url) -> Self {
        Self {
            urls: vec![start.to_string()],
        }
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.urls.iter().any(|u| u == url.as_str())
    }

    pub fn push(&mut self, url: &Url) {
        self.urls.push(url.to_string());
    }

    /// Number of redirect hops recorded after the starting URL
    pub fn hops(&self) -> usize {
        self.urls.len().saturating_sub(1)
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }
}

/// Mutable state of one URL check
#[derive(Debug, Clone)]
pub struct UrlCheckState {
    /// URL as requested
    pub original: Url,
    /// URL currently being requested (moves along redirects)
    pub url: Url,
    pub parent_url: Option<String>,
    pub method: Method,
    pub proxy: Option<ProxyConfig>,
    /// Basic credentials obtained after a 401
    pub auth: Option<String>,
    /// Cookies sent with the last request
    pub cookies: Vec<String>,
    pub headers: Option<HeaderMap>,
    /// URLs reached through 301 redirects
    pub aliases: Vec<String>,
    pub trail: RedirectTrail,
    /// Request the URL without its fragment
    pub suppress_anchor: bool,
    pub seen_permanent_redirect: bool,
    /// HEAD was abandoned for GET because the server mishandled it
    pub fallback_to_get: bool,
    pub has_body: bool,
    pub body: Option<Bytes>,
    pub download_time: Option<Duration>,
    pub result: CheckResult,
    attempted: Vec<Fallback>,
}

impl UrlCheckState {
    pub fn new(url: Url, parent_url: Option<String>) -> Self {
        Self {
            trail: RedirectTrail::new(&url),
            result: CheckResult::new(url.as_str()),
            original: url.clone(),
            url,
            parent_url,
            method: Method::Head,
            proxy: None,
            auth: None,
            cookies: Vec::new(),
            headers: None,
            aliases: Vec::new(),
            suppress_anchor: false,
            seen_permanent_redirect: false,
            fallback_to_get: false,
            has_body: false,
            body: None,
            download_time: None,
            attempted: Vec::new(),
        }
    }

    /// Marks a fallback as used; returns false if it already fired
    pub fn attempt(&mut self, fallback: Fallback) -> bool {
        if self.attempted.contains(&fallback) {
            return false;
        }
        self.attempted.push(fallback);
        true
    }

    pub fn has_attempted(&self, fallback: Fallback) -> bool {
        self.attempted.contains(&fallback)
    }

    /// Switches from HEAD to GET and restarts from the requested URL
    pub fn downgrade_to_get(&mut self) {
        self.method = Method::Get;
        self.url = self.original.clone();
        self.trail = RedirectTrail::new(&self.original);
        self.fallback_to_get = true;
    }

    /// Switches to GET for the current URL without restarting the chain
    pub fn switch_to_get(&mut self) {
        self.method = Method::Get;
    }

    pub fn strip_anchor(&mut self) {
        self.suppress_anchor = true;
    }

    /// URL as it goes on the wire
    pub fn request_url(&self) -> Url {
        let mut url = self.url.clone();
        if self.suppress_anchor {
            url.set_fragment(None);
        }
        url
    }

    /// The URL and every alias reached through a 301
    pub fn cache_keys(&self) -> Vec<String> {
        let mut keys = vec![self.original.to_string()];
        if self.url != self.original {
            keys.push(self.url.to_string());
        }
        for alias in &self.aliases {
            if !keys.contains(alias) {
                keys.push(alias.clone());
            }
        }
        keys
    }

    /// Header lookup on the latest response
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()
            .and_then(|h| h.get(name))
            .and_then(|v| v.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(url: &str) -> UrlCheckState {
        UrlCheckState::new(Url::parse(url).unwrap(), None)
    }

    #[test]
    fn test_starts_with_head() {
        let s = state("http://example.com/");
        assert_eq!(s.method, Method::Head);
        assert_eq!(s.trail.hops(), 0);
        assert!(!s.fallback_to_get);
    }

    #[test]
    fn test_attempt_fires_once() {
        let mut s = state("http://example.com/");
        assert!(s.attempt(Fallback::BadStatusLine));
        assert!(!s.attempt(Fallback::BadStatusLine));
        assert!(s.has_attempted(Fallback::BadStatusLine));
        assert!(s.attempt(Fallback::ClientError));
    }

    #[test]
    fn test_downgrade_restarts_from_original() {
        let mut s = state("http://example.com/start");
        s.url = Url::parse("http://example.com/moved").unwrap();
        s.trail.push(&s.url.clone());

        s.downgrade_to_get();

        assert_eq!(s.method, Method::Get);
        assert_eq!(s.url.as_str(), "http://example.com/start");
        assert_eq!(s.trail.urls(), ["http://example.com/start".to_string()]);
        assert!(s.fallback_to_get);
    }

    #[test]
    fn test_request_url_strips_fragment_when_suppressed() {
        let mut s = state("http://example.com/page#top");
        assert_eq!(s.request_url().fragment(), Some("top"));
        s.strip_anchor();
        assert_eq!(s.request_url().as_str(), "http://example.com/page");
    }

    #[test]
    fn test_cache_keys_include_aliases_once() {
        let mut s = state("http://example.com/a");
        s.url = Url::parse("http://example.com/c").unwrap();
        s.aliases.push("http://example.com/b".to_string());
        s.aliases.push("http://example.com/c".to_string());

        assert_eq!(
            s.cache_keys(),
            vec![
                "http://example.com/a".to_string(),
                "http://example.com/c".to_string(),
                "http://example.com/b".to_string(),
            ]
        );
    }

    #[test]
    fn test_trail_hops() {
        let start = Url::parse("http://example.com/").unwrap();
        let mut trail = RedirectTrail::new(&start);
        let next = Url::parse("http://example.com/next").unwrap();
        assert!(trail.contains(&start));
        assert!(!trail.contains(&next));
        trail.push(&next);
        assert_eq!(trail.hops(), 1);
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(reqwest::Method::from(Method::Head), reqwest::Method::HEAD);
        assert_eq!(Method::Get.to_string(), "GET");
    }
}

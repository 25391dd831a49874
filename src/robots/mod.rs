//! Robots.txt handling module
//!
//! [`RobotsPolicy`] fetches `scheme://host/robots.txt` once per host, keeps
//! the parsed rules in a shared cache and answers allow/deny questions for
//! URLs on that host.

mod cache;
mod parser;

pub use cache::RobotsEntry;
pub use parser::ParsedRobots;

use crate::checker::{PhysicalRequest, RequestExecutor};
use crate::url::{robots_txt_url, ProxyConfig};
use chrono::Duration;
use parking_lot::RwLock;
use std::collections::HashMap;
use url::Url;

/// Per-host robots.txt cache shared by all checks
///
/// Two checks racing on an uncached host may both fetch robots.txt; the
/// second insert simply replaces an identical entry.
#[derive(Debug, Default)]
pub struct RobotsPolicy {
    entries: RwLock<HashMap<String, RobotsEntry>>,
    ttl: Option<Duration>,
}

impl RobotsPolicy {
    /// Creates an empty policy; `ttl` of `None` caches for the process lifetime
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Seeds the cache for a robots.txt URL
    pub fn insert(&self, robots_url: &str, robots: ParsedRobots) {
        self.entries
            .write()
            .insert(robots_url.to_string(), RobotsEntry::new(robots));
    }

    /// Fresh cached entry for a robots.txt URL, if any
    pub fn cached(&self, robots_url: &str) -> Option<RobotsEntry> {
        self.entries
            .read()
            .get(robots_url)
            .filter(|entry| !entry.is_stale(self.ttl))
            .cloned()
    }

    /// Drops the cached entry for a robots.txt URL
    pub fn invalidate(&self, robots_url: &str) {
        self.entries.write().remove(robots_url);
    }

    /// Checks whether `user_agent` may fetch `url`
    ///
    /// # Arguments
    ///
    /// * `executor` - Used to fetch robots.txt when the host is not cached
    /// * `url` - The URL to check
    /// * `user_agent` - Product token matched against `User-agent` lines
    /// * `header_agent` - Full `User-Agent` header sent with the fetch
    /// * `proxy` - Proxy for the URL's scheme, if any
    pub async fn allowed(
        &self,
        executor: &dyn RequestExecutor,
        url: &Url,
        user_agent: &str,
        header_agent: &str,
        proxy: Option<&ProxyConfig>,
    ) -> bool {
        let robots_url = robots_txt_url(url);
        tracing::debug!("robots.txt url {} for {}", robots_url, url);

        let entry = match self.cached(&robots_url) {
            Some(entry) => entry,
            None => {
                let robots = fetch_robots(executor, &robots_url, header_agent, proxy).await;
                self.insert(&robots_url, robots);
                match self.cached(&robots_url) {
                    Some(entry) => entry,
                    None => return true,
                }
            }
        };

        entry.is_allowed(url.as_str(), user_agent)
    }
}

/// Fetches and parses robots.txt
///
/// | Outcome | Rules |
/// |---------|-------|
/// | 2xx | parsed body |
/// | 401 / 403 | disallow all |
/// | other status | allow all |
/// | transport failure | allow all |
pub async fn fetch_robots(
    executor: &dyn RequestExecutor,
    robots_url: &str,
    header_agent: &str,
    proxy: Option<&ProxyConfig>,
) -> ParsedRobots {
    let url = match Url::parse(robots_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("Invalid robots.txt url {}: {}", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    let request = PhysicalRequest::fetch(url, header_agent, proxy.cloned());
    match executor.execute(&request).await {
        Ok(response) if (200..300).contains(&response.status) => {
            let body = response.body.unwrap_or_default();
            ParsedRobots::from_content(&String::from_utf8_lossy(&body))
        }
        Ok(response) if response.status == 401 || response.status == 403 => {
            tracing::info!("{} answered {}, disallowing all", robots_url, response.status);
            ParsedRobots::disallow_all()
        }
        Ok(response) => {
            tracing::debug!("{} answered {}, allowing all", robots_url, response.status);
            ParsedRobots::allow_all()
        }
        Err(e) => {
            tracing::warn!("Failed to fetch {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::RawResponse;
    use crate::Result;
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;

    struct StaticRobots {
        status: u16,
        body: &'static str,
        requests: Mutex<Vec<String>>,
    }

    impl StaticRobots {
        fn new(status: u16, body: &'static str) -> Self {
            Self {
                status,
                body,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn count(&self) -> usize {
            self.requests.lock().len()
        }
    }

    #[async_trait]
    impl RequestExecutor for StaticRobots {
        async fn execute(&self, request: &PhysicalRequest) -> Result<RawResponse> {
            self.requests.lock().push(request.url.to_string());
            let mut response = RawResponse::new(self.status, "");
            response.body = Some(Bytes::from_static(self.body.as_bytes()));
            Ok(response)
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_fetches_once_per_host() {
        let executor = StaticRobots::new(200, "User-agent: *\nDisallow: /admin");
        let policy = RobotsPolicy::new(None);

        assert!(policy.allowed(&executor, &url("http://a.com/x"), "Bot", "Bot/1", None).await);
        assert!(!policy.allowed(&executor, &url("http://a.com/admin"), "Bot", "Bot/1", None).await);
        assert_eq!(executor.count(), 1);
        assert_eq!(executor.requests.lock()[0], "http://a.com/robots.txt");

        assert!(policy.allowed(&executor, &url("http://b.com/"), "Bot", "Bot/1", None).await);
        assert_eq!(executor.count(), 2);
    }

    #[tokio::test]
    async fn test_missing_robots_allows_all() {
        let executor = StaticRobots::new(404, "");
        let policy = RobotsPolicy::new(None);
        assert!(policy.allowed(&executor, &url("http://a.com/admin"), "Bot", "Bot/1", None).await);
    }

    #[tokio::test]
    async fn test_forbidden_robots_disallows_all() {
        let executor = StaticRobots::new(403, "");
        let policy = RobotsPolicy::new(None);
        assert!(!policy.allowed(&executor, &url("http://a.com/"), "Bot", "Bot/1", None).await);
    }

    #[tokio::test]
    async fn test_seeded_entry_skips_fetch() {
        let executor = StaticRobots::new(200, "");
        let policy = RobotsPolicy::new(None);
        policy.insert("http://a.com/robots.txt", ParsedRobots::disallow_all());

        assert!(!policy.allowed(&executor, &url("http://a.com/"), "Bot", "Bot/1", None).await);
        assert_eq!(executor.count(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let executor = StaticRobots::new(200, "");
        let policy = RobotsPolicy::new(None);
        policy.allowed(&executor, &url("http://a.com/"), "Bot", "Bot/1", None).await;
        policy.invalidate("http://a.com/robots.txt");
        policy.allowed(&executor, &url("http://a.com/"), "Bot", "Bot/1", None).await;
        assert_eq!(executor.count(), 2);
    }
}

//! URL checking module
//!
//! This module contains the check logic, including:
//! - Physical request construction and execution
//! - Redirect following with loop and overflow detection
//! - The per-URL session with its HEAD/GET and auth fallbacks
//! - Lazy body download and decoding
//!
//! A [`Checker`] holds the collaborators shared by every check (robots cache,
//! result cache, cookie store, crawl queue, credentials) and hands out one
//! [`HttpUrlCheck`] session per URL.

mod content;
mod executor;
mod redirect;
mod session;

pub use content::{decode_body, is_supported_encoding, media_type, SUPPORTED_ENCODINGS};
pub use executor::{
    build_request, HttpExecutor, PhysicalRequest, RawResponse, RequestExecutor, ACCEPT_ENCODING,
};
pub use redirect::{is_redirect, RedirectOutcome};
pub use session::HttpUrlCheck;

use crate::config::Config;
use crate::robots::RobotsPolicy;
use crate::state::CheckResult;
use crate::storage::{
    ConfigCredentials, CookieStore, CrawlQueue, CredentialProvider, JarCookieStore, MemoryQueue,
    MemoryResultCache, ResultCache,
};
use crate::{ConfigError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use regex::RegexSet;
use std::sync::Arc;
use std::time::Duration;

/// A URL waiting to be checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckTask {
    pub url: String,
    /// Page the URL was found on; sent as `Referer`
    pub parent_url: Option<String>,
    /// Messages carried over from the check that produced this task
    pub warnings: Vec<String>,
    pub infos: Vec<String>,
}

impl CheckTask {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            parent_url: None,
            warnings: Vec::new(),
            infos: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent_url: impl Into<String>) -> Self {
        self.parent_url = Some(parent_url.into());
        self
    }
}

/// Contract of one URL check session
#[async_trait]
pub trait UrlCheck: Send {
    /// Runs the check to a terminal classification
    ///
    /// Calling it again returns the settled result without new requests.
    async fn check(&mut self) -> Result<CheckResult>;

    fn result(&self) -> &CheckResult;

    /// Keys under which the result should be cached
    fn cache_keys(&self) -> Vec<String>;

    /// Body of the resource, downloaded at most once
    async fn content(&mut self) -> Result<Bytes>;

    /// True for valid HTML or CSS resources whose encoding can be decoded
    fn is_parseable(&mut self) -> bool;
}

/// Everything a session needs besides its own state
#[derive(Clone)]
pub(crate) struct CheckContext {
    pub(crate) config: Arc<Config>,
    pub(crate) executor: Arc<dyn RequestExecutor>,
    pub(crate) robots: Arc<RobotsPolicy>,
    pub(crate) cache: Arc<dyn ResultCache>,
    pub(crate) cookies: Arc<dyn CookieStore>,
    pub(crate) queue: Arc<dyn CrawlQueue>,
    pub(crate) credentials: Arc<dyn CredentialProvider>,
    pub(crate) head_hostile: RegexSet,
    /// `User-Agent` header value
    pub(crate) user_agent: String,
    /// Product token matched against robots.txt groups
    pub(crate) robots_agent: String,
}

/// Entry point for checking URLs
///
/// # Example
///
/// ```no_run
/// use linkprobe::{CheckTask, Checker, Config};
///
/// # async fn run() -> linkprobe::Result<()> {
/// let checker = Checker::new(Config::default())?;
/// let result = checker.check(CheckTask::new("http://example.com/")).await?;
/// println!("{} {}", result.url, result.classification);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Checker {
    ctx: Arc<CheckContext>,
}

impl Checker {
    /// Creates a checker with the reqwest executor and in-memory collaborators
    pub fn new(config: Config) -> Result<Self> {
        let executor = HttpExecutor::new(
            Duration::from_secs(config.checker.timeout_secs),
            Duration::from_secs(config.checker.connect_timeout_secs),
            config.checker.debug,
        );
        Self::with_executor(config, Arc::new(executor))
    }

    /// Creates a checker sending its requests through `executor`
    pub fn with_executor(config: Config, executor: Arc<dyn RequestExecutor>) -> Result<Self> {
        let head_hostile = RegexSet::new(&config.checker.head_hostile_hosts)
            .map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;
        let ttl = config
            .checker
            .robots_ttl_hours
            .map(|h| chrono::Duration::hours(h as i64));

        let ctx = CheckContext {
            user_agent: config.user_agent.header_value(),
            robots_agent: config.user_agent.crawler_name.clone(),
            credentials: Arc::new(ConfigCredentials::new(&config.auth)),
            config: Arc::new(config),
            executor,
            robots: Arc::new(RobotsPolicy::new(ttl)),
            cache: Arc::new(MemoryResultCache::new()),
            cookies: Arc::new(JarCookieStore::new()),
            queue: Arc::new(MemoryQueue::new()),
            head_hostile,
        };

        Ok(Self { ctx: Arc::new(ctx) })
    }

    pub fn with_result_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        Arc::make_mut(&mut self.ctx).cache = cache;
        self
    }

    pub fn with_cookie_store(mut self, cookies: Arc<dyn CookieStore>) -> Self {
        Arc::make_mut(&mut self.ctx).cookies = cookies;
        self
    }

    pub fn with_queue(mut self, queue: Arc<dyn CrawlQueue>) -> Self {
        Arc::make_mut(&mut self.ctx).queue = queue;
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        Arc::make_mut(&mut self.ctx).credentials = credentials;
        self
    }

    /// Shares a robots.txt cache with other checkers
    pub fn with_robots(mut self, robots: Arc<RobotsPolicy>) -> Self {
        Arc::make_mut(&mut self.ctx).robots = robots;
        self
    }

    /// Opens a session for `task` without running it
    pub fn session(&self, task: CheckTask) -> Result<HttpUrlCheck> {
        HttpUrlCheck::new(Arc::clone(&self.ctx), task)
    }

    /// Checks one URL to a terminal classification
    pub async fn check(&self, task: CheckTask) -> Result<CheckResult> {
        let mut session = self.session(task)?;
        session.check().await
    }

    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    pub fn robots(&self) -> &Arc<RobotsPolicy> {
        &self.ctx.robots
    }

    pub fn result_cache(&self) -> &Arc<dyn ResultCache> {
        &self.ctx.cache
    }

    pub fn user_agent(&self) -> &str {
        &self.ctx.user_agent
    }
}

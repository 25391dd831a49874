//! Collaborator traits
//!
//! A check talks to the rest of the crawler only through these narrow
//! contracts. Implementations are shared between concurrent checks and must
//! provide their own locking.

use crate::checker::CheckTask;
use crate::state::CheckResult;
use reqwest::header::HeaderMap;

/// Results of finished checks, keyed by URL string
pub trait ResultCache: Send + Sync {
    fn has_key(&self, key: &str) -> bool;

    fn get(&self, key: &str) -> Option<CheckResult>;

    fn set(&self, key: &str, result: CheckResult);
}

/// Cookie persistence
pub trait CookieStore: Send + Sync {
    /// Cookies (`name=value`) to send to `host` for `path`
    fn get(&self, host: &str, path: &str) -> Vec<String>;

    /// Remembers cookies set by a response from `host`
    ///
    /// Returns one informational line per stored cookie.
    fn store(&self, headers: &HeaderMap, host: &str) -> Vec<String>;
}

/// Queue of pending checks
pub trait CrawlQueue: Send + Sync {
    fn append(&self, task: CheckTask);
}

/// Username and password for a URL that answered 401
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

/// Source of credentials (configuration, interactive prompt, ...)
pub trait CredentialProvider: Send + Sync {
    fn get(&self, url: &str) -> Option<Credentials>;
}

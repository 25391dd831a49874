//! In-process implementations of the collaborator traits

use crate::checker::CheckTask;
use crate::config::AuthEntry;
use crate::state::CheckResult;
use crate::storage::{CookieStore, CrawlQueue, CredentialProvider, Credentials, ResultCache};
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use reqwest::cookie::CookieStore as _;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
use std::collections::{HashMap, VecDeque};
use url::Url;

/// Result cache held in memory for the process lifetime
#[derive(Debug, Default)]
pub struct MemoryResultCache {
    entries: RwLock<HashMap<String, CheckResult>>,
}

impl MemoryResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ResultCache for MemoryResultCache {
    fn has_key(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    fn get(&self, key: &str) -> Option<CheckResult> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, result: CheckResult) {
        self.entries.write().insert(key.to_string(), result);
    }
}

/// FIFO queue of derived checks
#[derive(Debug, Default)]
pub struct MemoryQueue {
    tasks: Mutex<VecDeque<CheckTask>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop(&self) -> Option<CheckTask> {
        self.tasks.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

impl CrawlQueue for MemoryQueue {
    fn append(&self, task: CheckTask) {
        self.tasks.lock().push_back(task);
    }
}

/// Cookie store backed by reqwest's cookie jar
///
/// Hosts are addressed over plain HTTP, so `Secure` cookies are never
/// replayed.
#[derive(Debug, Default)]
pub struct JarCookieStore {
    jar: Jar,
}

impl JarCookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn jar_url(host: &str, path: &str) -> Option<Url> {
        let path = if path.starts_with('/') { path } else { "/" };
        Url::parse(&format!("http://{}{}", host, path)).ok()
    }
}

impl CookieStore for JarCookieStore {
    fn get(&self, host: &str, path: &str) -> Vec<String> {
        let Some(url) = Self::jar_url(host, path) else {
            return Vec::new();
        };

        self.jar
            .cookies(&url)
            .and_then(|value| value.to_str().map(str::to_string).ok())
            .map(|joined| {
                joined
                    .split("; ")
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn store(&self, headers: &HeaderMap, host: &str) -> Vec<String> {
        let Some(url) = Self::jar_url(host, "/") else {
            return Vec::new();
        };

        let set_cookies: Vec<&HeaderValue> = headers.get_all(SET_COOKIE).iter().collect();
        let infos = set_cookies
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(|v| format!("Set-Cookie: {}", v))
            .collect();

        let mut iter = set_cookies.into_iter();
        self.jar.set_cookies(&mut iter, &url);
        infos
    }
}

/// Credentials from the `[[auth]]` configuration entries
///
/// The first entry whose pattern matches the URL wins; URLs matching no
/// entry get anonymous credentials.
#[derive(Debug, Clone)]
pub struct ConfigCredentials {
    entries: Vec<(Regex, Credentials)>,
}

impl ConfigCredentials {
    /// Compiles the configured patterns, skipping any that do not compile
    pub fn new(entries: &[AuthEntry]) -> Self {
        let entries = entries
            .iter()
            .filter_map(|entry| match Regex::new(&entry.pattern) {
                Ok(re) => Some((
                    re,
                    Credentials {
                        user: entry.user.clone(),
                        password: entry.password.clone(),
                    },
                )),
                Err(e) => {
                    tracing::warn!("Ignoring auth pattern '{}': {}", entry.pattern, e);
                    None
                }
            })
            .collect();
        Self { entries }
    }

    fn anonymous() -> Credentials {
        Credentials {
            user: "anonymous".to_string(),
            password: "guest@".to_string(),
        }
    }
}

impl CredentialProvider for ConfigCredentials {
    fn get(&self, url: &str) -> Option<Credentials> {
        let found = self
            .entries
            .iter()
            .find(|(re, _)| re.is_match(url))
            .map(|(_, creds)| creds.clone());
        Some(found.unwrap_or_else(Self::anonymous))
    }
}

use serde::Deserialize;
use std::collections::HashMap;

/// Pattern matching hosts that reject HEAD requests outright
pub const DEFAULT_HEAD_HOSTILE_HOST: &str = r"^www\.amazon\.(com|de|ca|fr|co\.(uk|jp))";

/// Main configuration structure for Linkprobe
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub checker: CheckerConfig,

    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,

    /// Proxy URL per URL scheme (e.g. `http = "http://user:pw@proxy:3128"`)
    #[serde(default)]
    pub proxy: HashMap<String, String>,

    #[serde(default)]
    pub auth: Vec<AuthEntry>,
}

/// Check behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CheckerConfig {
    /// Maximum redirect hops followed in one request chain
    #[serde(rename = "max-redirects", default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Send stored cookies and remember cookies from valid responses
    #[serde(default)]
    pub cookies: bool,

    /// Verbose connection logging
    #[serde(default)]
    pub debug: bool,

    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connect timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Lifetime of a cached robots.txt; `None` keeps it for the process lifetime
    #[serde(rename = "robots-ttl-hours", default)]
    pub robots_ttl_hours: Option<u64>,

    /// Host regexes for which checks start with GET instead of HEAD
    #[serde(rename = "head-hostile-hosts", default = "default_head_hostile_hosts")]
    pub head_hostile_hosts: Vec<String>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            max_redirects: default_max_redirects(),
            cookies: false,
            debug: false,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            robots_ttl_hours: None,
            head_hostile_hosts: default_head_hostile_hosts(),
        }
    }
}

fn default_max_redirects() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_head_hostile_hosts() -> Vec<String> {
    vec![DEFAULT_HEAD_HOSTILE_HOST.to_string()]
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the checker, also the robots.txt product token
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the checker
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "Linkprobe".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/linkprobe".to_string(),
            contact_email: "linkprobe@example.com".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Credentials used when a server answers 401
#[derive(Debug, Clone, Deserialize)]
pub struct AuthEntry {
    /// Regex matched against the full URL
    pub pattern: String,
    pub user: String,
    pub password: String,
}

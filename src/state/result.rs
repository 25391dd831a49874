//! Classified outcome of one URL check
use std::fmt;

/// Final (or pending) classification of a checked URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// The check has not reached a terminal state, or was handed off
    Pending,
    /// Reachable; warnings may still be attached
    Valid,
    /// Not checked over the network, only for syntax
    Warning,
    /// Unreachable or answered with an error status
    Error,
}

impl Classification {
    /// Returns true once the check has reached a terminal classification
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Valid => "valid",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of the problem behind a warning or error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    PolicyDenied,
    Protocol,
    Connection,
    MalformedResponse,
    RedirectLoop,
    RedirectOverflow,
    AuthRequired,
    HttpStatus { code: u16 },
}

/// Result of checking one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    /// URL as requested (the effective URL after redirects once checked)
    pub url: String,
    pub classification: Classification,
    /// Status line summary (`200 OK`) or error description
    pub summary: Option<String>,
    pub issue: Option<IssueKind>,
    pub warnings: Vec<String>,
    pub infos: Vec<String>,
    /// The result was copied from the result cache
    pub cached: bool,
    /// The URL was handed to another check after a cross-scheme redirect
    pub delegated_to: Option<String>,
}

impl CheckResult {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            classification: Classification::Pending,
            summary: None,
            issue: None,
            warnings: Vec::new(),
            infos: Vec::new(),
            cached: false,
            delegated_to: None,
        }
    }

    pub fn set_valid(&mut self, summary: impl Into<String>) {
        self.classification = Classification::Valid;
        self.summary = Some(summary.into());
        self.issue = None;
    }

    /// Terminal warning: the URL was deliberately not fetched
    pub fn set_warned(&mut self, issue: IssueKind, message: impl Into<String>) {
        let message = message.into();
        self.classification = Classification::Warning;
        self.issue = Some(issue);
        self.warnings.push(message.clone());
        self.summary = Some(message);
    }

    pub fn set_error(&mut self, issue: IssueKind, message: impl Into<String>) {
        self.classification = Classification::Error;
        self.issue = Some(issue);
        self.summary = Some(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn add_info(&mut self, message: impl Into<String>) {
        self.infos.push(message.into());
    }

    /// Replaces the outcome with a cached one, keeping this result's URL
    pub fn copy_from_cache(&mut self, cached: &CheckResult) {
        let url = std::mem::take(&mut self.url);
        *self = cached.clone();
        self.url = url;
        self.cached = true;
    }

    pub fn is_valid(&self) -> bool {
        self.classification == Classification::Valid
    }

    pub fn is_error(&self) -> bool {
        self.classification == Classification::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_result_is_pending() {
        let result = CheckResult::new("http://example.com/");
        assert_eq!(result.classification, Classification::Pending);
        assert!(!result.classification.is_terminal());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_set_warned_records_message() {
        let mut result = CheckResult::new("http://example.com/");
        result.set_warned(IssueKind::PolicyDenied, "denied");
        assert_eq!(result.classification, Classification::Warning);
        assert_eq!(result.issue, Some(IssueKind::PolicyDenied));
        assert_eq!(result.warnings, vec!["denied".to_string()]);
    }

    #[test]
    fn test_valid_clears_issue() {
        let mut result = CheckResult::new("http://example.com/");
        result.set_error(IssueKind::HttpStatus { code: 500 }, "500 Internal Server Error");
        result.set_valid("200 OK");
        assert!(result.is_valid());
        assert_eq!(result.issue, None);
    }

    #[test]
    fn test_copy_from_cache_keeps_url() {
        let mut cached = CheckResult::new("http://example.com/new");
        cached.set_valid("200 OK");
        cached.add_info("Last modified yesterday");

        let mut result = CheckResult::new("http://example.com/old");
        result.copy_from_cache(&cached);

        assert_eq!(result.url, "http://example.com/old");
        assert!(result.cached);
        assert!(result.is_valid());
        assert_eq!(result.infos.len(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(Classification::Valid.to_string(), "valid");
        assert_eq!(Classification::Error.to_string(), "error");
    }
}

//! One logical HTTP check
//!
//! # Request Flow
//!
//! 1. Ask robots.txt; a denied URL is only checked for syntax
//! 2. Pick HEAD, or GET for hosts known to reject HEAD
//! 3. Send the request, honoring a 305 proxy demand once
//! 4. Follow 301/302 redirects
//! 5. Decide: retry with a fallback, or classify
//!
//! # Fallbacks
//!
//! | Condition | Action |
//! |-----------|--------|
//! | Malformed status line, HEAD | GET from the original URL |
//! | Redirect loop or overflow, HEAD | GET from the original URL |
//! | 401, no credentials tried | retry with Basic auth |
//! | Error status, URL has fragment | retry without fragment |
//! | Error status, HEAD | GET from the original URL |
//! | `application/octet-stream` from a MIME-blind server, HEAD | GET |
//!
//! Each fallback fires at most once; anything else is classified.

use crate::checker::content::{fetch_content, is_supported_encoding, media_type};
use crate::checker::executor::{send, RawResponse};
use crate::checker::redirect::{RedirectOutcome, RedirectResolver};
use crate::checker::{CheckContext, CheckTask, UrlCheck};
use crate::state::{CheckResult, Fallback, IssueKind, Method, UrlCheckState};
use crate::url::{basic_auth, host_with_port, parse_check_url, ProxyConfig};
use crate::{CheckError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::Duration;

/// Server signatures that answer HEAD with `application/octet-stream`
const MIME_BLIND_SERVERS: &[&str] = &["Zope"];

/// Next move after evaluating a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    RetryWithCredentials,
    StripAnchor,
    /// HEAD got an error status; restart with GET
    FallbackToGet,
    /// HEAD cannot tell the MIME type; repeat with GET
    SniffWithGet,
    Classify,
}

/// Chooses what to do with a response that ended the redirect chain
///
/// Credentials are tried before the fragment is stripped.
pub(crate) fn decide(state: &UrlCheckState, response: &RawResponse) -> Decision {
    if response.status == 401 {
        if state.has_attempted(Fallback::Credentials) {
            return Decision::Classify;
        }
        return Decision::RetryWithCredentials;
    }

    if response.status >= 400 {
        if state.url.fragment().is_some() && !state.has_attempted(Fallback::StripAnchor) {
            return Decision::StripAnchor;
        }
        if state.method == Method::Head && !state.has_attempted(Fallback::ClientError) {
            return Decision::FallbackToGet;
        }
        return Decision::Classify;
    }

    if state.method != Method::Get
        && !state.has_attempted(Fallback::MimeSniff)
        && is_mime_blind(&response.headers)
    {
        return Decision::SniffWithGet;
    }

    Decision::Classify
}

fn is_mime_blind(headers: &HeaderMap) -> bool {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };
    let content_type = headers.get("content-type").and_then(|v| v.to_str().ok());
    if media_type(content_type) != "application/octet-stream" {
        return false;
    }

    let powered_by = header("x-powered-by");
    let server = header("server");
    MIME_BLIND_SERVERS
        .iter()
        .any(|sig| powered_by.starts_with(sig) || server.starts_with(sig))
}

enum Step {
    Retry,
    Finished,
    Classify(RawResponse),
}

/// Check session for one http(s) URL
pub struct HttpUrlCheck {
    ctx: Arc<CheckContext>,
    state: UrlCheckState,
    path_was_empty: bool,
}

impl HttpUrlCheck {
    pub(crate) fn new(ctx: Arc<CheckContext>, task: CheckTask) -> Result<Self> {
        let parsed = parse_check_url(&task.url)?;
        let mut state = UrlCheckState::new(parsed.url, task.parent_url);
        state.result.warnings = task.warnings;
        state.result.infos = task.infos;

        Ok(Self {
            ctx,
            state,
            path_was_empty: parsed.path_was_empty,
        })
    }

    pub fn state(&self) -> &UrlCheckState {
        &self.state
    }

    /// Time taken by the body download, once it happened
    pub fn download_time(&self) -> Option<Duration> {
        self.state.download_time
    }

    /// Media type of the latest response
    pub fn content_type(&self) -> String {
        media_type(self.state.header("content-type"))
    }

    async fn run(&mut self) -> Result<()> {
        if self.path_was_empty {
            self.state
                .result
                .add_warning("URL path is empty, assuming '/' as path");
        }

        // set the proxy, so a 407 status after this is an error
        if let Some(raw) = self.ctx.config.proxy.get(self.state.url.scheme()) {
            let proxy = ProxyConfig::parse(raw)?;
            self.state
                .result
                .add_info(format!("Using proxy {}", proxy.address));
            self.state.proxy = Some(proxy);
        }

        let allowed = self
            .ctx
            .robots
            .allowed(
                self.ctx.executor.as_ref(),
                &self.state.url,
                &self.ctx.robots_agent,
                &self.ctx.user_agent,
                self.state.proxy.as_ref(),
            )
            .await;
        if !allowed {
            tracing::info!("{} disallowed by robots.txt", self.state.url);
            self.state.result.set_warned(
                IssueKind::PolicyDenied,
                "Access denied by robots.txt, checked only syntax",
            );
            return Ok(());
        }

        let host = self.state.url.host_str().unwrap_or_default();
        if self.ctx.head_hostile.is_match(host) {
            self.state.result.add_warning(format!(
                "Server {} is known to block HTTP HEAD requests, using GET instead",
                host
            ));
            self.state.switch_to_get();
        }

        loop {
            match self.step().await? {
                Step::Retry => continue,
                Step::Finished => return Ok(()),
                Step::Classify(response) => {
                    self.classify(response);
                    return Ok(());
                }
            }
        }
    }

    /// One pass through Requesting and GotResponse
    async fn step(&mut self) -> Result<Step> {
        let outcome = match self.exchange().await {
            Ok(outcome) => outcome,
            Err(CheckError::MalformedResponse { url, message })
                if self.state.method == Method::Head =>
            {
                // some servers send empty HEAD replies
                if !self.state.attempt(Fallback::BadStatusLine) {
                    return Err(CheckError::MalformedResponse { url, message });
                }
                tracing::info!("Bad status line from {} for HEAD, retrying with GET", url);
                self.state.downgrade_to_get();
                return Ok(Step::Retry);
            }
            Err(e) => return Err(e),
        };

        let response = match outcome {
            RedirectOutcome::Response(response) => response,
            RedirectOutcome::Terminal => return Ok(Step::Finished),
            RedirectOutcome::Overflow => {
                if self.state.method == Method::Head
                    && self.state.attempt(Fallback::RedirectOverflow)
                {
                    tracing::info!("Redirect overflow for HEAD {}, retrying with GET", self.state.original);
                    self.state.downgrade_to_get();
                    return Ok(Step::Retry);
                }
                let max = self.ctx.config.checker.max_redirects;
                self.state.result.set_error(
                    IssueKind::RedirectOverflow,
                    format!("more than {} redirections, aborting", max),
                );
                return Ok(Step::Finished);
            }
        };

        match decide(&self.state, &response) {
            Decision::Classify => Ok(Step::Classify(response)),
            Decision::RetryWithCredentials => {
                self.state.attempt(Fallback::Credentials);
                match self.ctx.credentials.get(self.state.url.as_str()) {
                    Some(creds) => {
                        tracing::debug!("Authenticating as {} for {}", creds.user, self.state.url);
                        self.state.auth = Some(basic_auth(&creds.user, &creds.password));
                        self.restart_chain();
                        Ok(Step::Retry)
                    }
                    None => {
                        self.state.result.set_error(
                            IssueKind::AuthRequired,
                            format!("{} (no credentials available)", response.status_line()),
                        );
                        Ok(Step::Finished)
                    }
                }
            }
            Decision::StripAnchor => {
                self.state.attempt(Fallback::StripAnchor);
                self.state.strip_anchor();
                self.restart_chain();
                Ok(Step::Retry)
            }
            Decision::FallbackToGet => {
                self.state.attempt(Fallback::ClientError);
                self.state.downgrade_to_get();
                Ok(Step::Retry)
            }
            Decision::SniffWithGet => {
                self.state.attempt(Fallback::MimeSniff);
                let server = self.server_name();
                self.state.result.add_warning(format!(
                    "Server {} cannot determine MIME type with HEAD, falling back to GET",
                    server
                ));
                self.state.switch_to_get();
                self.restart_chain();
                Ok(Step::Retry)
            }
        }
    }

    /// Sends the request, honors a 305 and follows redirects
    async fn exchange(&mut self) -> Result<RedirectOutcome> {
        let mut response = send(&self.ctx, &mut self.state).await?;

        if response.status == 305 {
            response = self.follow_enforced_proxy(response).await?;
        }

        RedirectResolver::new(&self.ctx)
            .resolve(&mut self.state, response)
            .await
    }

    /// Repeats the request once through the proxy named by a 305 response
    async fn follow_enforced_proxy(&mut self, response: RawResponse) -> Result<RawResponse> {
        let Some(location) = response.location() else {
            return Ok(response);
        };
        let proxy = match ProxyConfig::parse(&location) {
            Ok(proxy) => proxy,
            Err(e) => {
                tracing::warn!("Ignoring 305 with unusable proxy {}: {}", location, e);
                return Ok(response);
            }
        };

        self.state
            .result
            .add_info(format!("Enforced proxy {}", proxy.address));
        let previous = self.state.proxy.replace(proxy);
        let retried = send(&self.ctx, &mut self.state).await;
        self.state.proxy = previous;
        retried
    }

    /// Starts a new redirect chain at the current URL
    fn restart_chain(&mut self) {
        self.state.trail = crate::state::RedirectTrail::new(&self.state.url);
    }

    fn server_name(&self) -> String {
        self.state
            .header("server")
            .map(str::to_string)
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn classify(&mut self, response: RawResponse) {
        if self.state.url != self.state.original {
            let effective = self.state.url.to_string();
            self.state
                .result
                .add_warning(format!("Effective URL {}", effective));
            self.state.result.url = effective;
        }

        if response.status >= 400 {
            self.state.result.set_error(
                IssueKind::HttpStatus {
                    code: response.status,
                },
                response.status_line(),
            );
        } else {
            let server = self.server_name();
            if self.state.fallback_to_get {
                self.state.result.add_warning(format!(
                    "Server {} did not support HEAD request, used GET for checking",
                    server
                ));
            }
            if self.state.suppress_anchor {
                self.state.result.add_warning(format!(
                    "Server {} had no anchor support, removed anchor from request",
                    server
                ));
            }
            if response.status == 204 {
                self.state.result.add_warning(response.reason.clone());
            }

            if self.ctx.config.checker.cookies {
                for cookie in self.state.cookies.clone() {
                    self.state.result.add_info(format!("Cookie: {}", cookie));
                }
                let host = host_with_port(&self.state.url);
                for info in self.ctx.cookies.store(&response.headers, &host) {
                    self.state.result.add_info(info);
                }
            }

            if response.status >= 200 {
                self.state.result.set_valid(response.status_line());
            } else {
                self.state.result.set_valid("OK");
            }
        }

        if let Some(modified) = response.header("last-modified").filter(|m| !m.is_empty()) {
            self.state
                .result
                .add_info(format!("Last modified {}", modified));
        }
    }
}

#[async_trait]
impl UrlCheck for HttpUrlCheck {
    async fn check(&mut self) -> Result<CheckResult> {
        if !self.state.result.classification.is_terminal()
            && self.state.result.delegated_to.is_none()
        {
            self.run().await?;
        }
        Ok(self.state.result.clone())
    }

    fn result(&self) -> &CheckResult {
        &self.state.result
    }

    fn cache_keys(&self) -> Vec<String> {
        self.state.cache_keys()
    }

    async fn content(&mut self) -> Result<Bytes> {
        fetch_content(&self.ctx, &mut self.state).await
    }

    fn is_parseable(&mut self) -> bool {
        if !self.state.result.is_valid() || self.state.headers.is_none() {
            return false;
        }
        let content_type = self.content_type();
        if content_type != "text/html" && content_type != "text/css" {
            return false;
        }
        let encoding = self.state.header("content-encoding").map(str::to_string);
        if !is_supported_encoding(encoding.as_deref()) {
            self.state.result.add_warning(format!(
                "Unsupported content encoding {}",
                encoding.unwrap_or_default()
            ));
            return false;
        }
        true
    }
}

//! Redirect following
//!
//! Follows 301/302 chains for one session, recording the trail and the
//! permanent aliases, and stops at loops, cached URLs and scheme changes.

use crate::checker::executor::{send, RawResponse};
use crate::checker::{CheckContext, CheckTask};
use crate::state::{IssueKind, Method, UrlCheckState};
use crate::url::{is_http_scheme, join_location};
use crate::Result;

/// What the session should do after the redirect chain was followed
#[derive(Debug)]
pub enum RedirectOutcome {
    /// The chain ended; evaluate this response
    Response(RawResponse),
    /// Too many hops, or a loop seen while using HEAD
    Overflow,
    /// The result is settled (loop error, cache hit, delegated)
    Terminal,
}

pub fn is_redirect(status: u16) -> bool {
    status == 301 || status == 302
}

pub(crate) struct RedirectResolver<'a> {
    ctx: &'a CheckContext,
}

impl<'a> RedirectResolver<'a> {
    pub(crate) fn new(ctx: &'a CheckContext) -> Self {
        Self { ctx }
    }

    /// Follows redirects starting at `response`
    ///
    /// The chain may take at most `max-redirects` hops; a response that still
    /// redirects after that many hops is an overflow.
    pub(crate) async fn resolve(
        &self,
        state: &mut UrlCheckState,
        mut response: RawResponse,
    ) -> Result<RedirectOutcome> {
        let max = self.ctx.config.checker.max_redirects;

        loop {
            if !is_redirect(response.status) {
                return Ok(RedirectOutcome::Response(response));
            }
            let Some(location) = response.location() else {
                tracing::debug!("{} without Location for {}", response.status, state.url);
                return Ok(RedirectOutcome::Response(response));
            };
            if state.trail.hops() >= max {
                return Ok(RedirectOutcome::Overflow);
            }

            let next = match join_location(&state.url, &location) {
                Ok(next) => next,
                Err(e) => {
                    state.result.set_error(IssueKind::Protocol, e.to_string());
                    return Ok(RedirectOutcome::Terminal);
                }
            };
            tracing::debug!("Redirected {} -> {}", state.url, next);

            if state.trail.contains(&next) {
                state.trail.push(&next);
                if state.method == Method::Head {
                    // HEAD loops are often server quirks; let the session retry with GET
                    return Ok(RedirectOutcome::Overflow);
                }
                let trail = state.trail.urls().join("\n  => ");
                state.result.set_error(
                    IssueKind::RedirectLoop,
                    format!("recursive redirection encountered:\n {}", trail),
                );
                return Ok(RedirectOutcome::Terminal);
            }
            state.trail.push(&next);
            state.url = next.clone();

            if response.status == 301 {
                self.record_alias(state, next.as_str());
            }

            if self.ctx.cache.has_key(next.as_str()) {
                if let Some(cached) = self.ctx.cache.get(next.as_str()) {
                    tracing::debug!("{} already checked, copying cached result", next);
                    state.result.copy_from_cache(&cached);
                    return Ok(RedirectOutcome::Terminal);
                }
            }

            if !is_http_scheme(next.scheme()) {
                self.delegate(state, next.as_str());
                return Ok(RedirectOutcome::Terminal);
            }

            response = send(self.ctx, state).await?;
        }
    }

    fn record_alias(&self, state: &mut UrlCheckState, alias: &str) {
        if !state.seen_permanent_redirect {
            state.result.add_warning(
                "HTTP 301 (moved permanent) encountered: you should update this link.",
            );
            let original = state.original.as_str();
            if !(original.ends_with('/') || original.ends_with(".html")) {
                state.result.add_warning(
                    "A HTTP 301 redirection occured and the url has no trailing / at the end. \
                     All urls which point to (home) directories should end with a / to avoid \
                     redirection.",
                );
            }
            state.seen_permanent_redirect = true;
        }
        state.aliases.push(alias.to_string());
    }

    fn delegate(&self, state: &mut UrlCheckState, target: &str) {
        state.result.add_warning(format!(
            "HTTP redirection to non-http url encountered; the original url was {}.",
            state.original
        ));

        let task = CheckTask {
            url: target.to_string(),
            parent_url: state.parent_url.clone(),
            warnings: state.result.warnings.clone(),
            infos: state.result.infos.clone(),
        };
        tracing::info!("Delegating {} to a new check", target);
        self.ctx.queue.append(task);
        state.result.delegated_to = Some(target.to_string());
    }
}

//! State module for tracking a URL check
//!
//! # Components
//!
//! - `UrlCheckState`: Everything one check session accumulates (method, proxy,
//!   credentials, redirect trail, aliases, body)
//! - `RedirectTrail`: URLs visited by the current chain of redirects
//! - `CheckResult`: The classified outcome with its messages

mod check_state;
mod result;

pub use check_state::{Fallback, Method, RedirectTrail, UrlCheckState};
pub use result::{CheckResult, Classification, IssueKind};

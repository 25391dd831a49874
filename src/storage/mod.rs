//! Storage collaborators for URL checks
//!
//! The result cache, cookie store, crawl queue and credential source live
//! outside the check itself. This module defines their contracts and ships
//! in-memory implementations used by the command-line tool and the tests.

mod memory;
mod traits;

pub use memory::{ConfigCredentials, JarCookieStore, MemoryQueue, MemoryResultCache};
pub use traits::{CookieStore, CrawlQueue, CredentialProvider, Credentials, ResultCache};

//! Configuration module for Linkprobe
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section is optional; an empty file yields [`Config::default`].
//!
//! # Example
//!
//! ```no_run
//! use linkprobe::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("linkprobe.toml")).unwrap();
//! println!("Following at most {} redirects", config.checker.max_redirects);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{AuthEntry, CheckerConfig, Config, UserAgentConfig, DEFAULT_HEAD_HOSTILE_HOST};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

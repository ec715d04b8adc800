//! Configuration module for Sumi-Ripple
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sumi_ripple::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Fetch threads: {}", config.crawler.fetch_threads);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BloomConfig, Config, CrawlerConfig, PathsConfig, SearchConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};

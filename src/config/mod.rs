//! Configuration module for Site-Gleaner
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use site_gleaner::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("gleaner.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, ExtractionConfig, NavigatorConfig, SessionConfig, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{load_config, load_config_with_hash, parse_config};
pub use validation::validate;

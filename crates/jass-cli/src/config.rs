//! CLI configuration via environment variables
//!
//! VM limits come from jass.toml (see `jass_config`); this covers the
//! terminal-facing knobs only.

use std::env;
use tracing_subscriber::EnvFilter;

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Disable colored output (JASS_NO_COLOR=1 or NO_COLOR=1)
    pub no_color: bool,
    /// Log filter directives (RUST_LOG)
    pub log_filter: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            no_color: env::var("JASS_NO_COLOR").is_ok() || env::var("NO_COLOR").is_ok(),
            log_filter: env::var("RUST_LOG").ok().filter(|v| !v.trim().is_empty()),
        }
    }

    /// Filter directives to install; RUST_LOG wins over `--verbose`
    pub fn filter_directives(&self, verbose: bool) -> String {
        match &self.log_filter {
            Some(filter) => filter.clone(),
            None if verbose => "debug".to_string(),
            None => "warn".to_string(),
        }
    }

    /// Install the global tracing subscriber, writing to stderr
    pub fn init_logging(&self, verbose: bool) {
        let filter = EnvFilter::try_new(self.filter_directives(verbose))
            .unwrap_or_else(|_| EnvFilter::new("warn"));
        // A second init (tests) keeps the first subscriber
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(!self.no_color)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

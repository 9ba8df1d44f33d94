//! Environment-driven settings and logging setup shared by the binaries.

use crate::limits::SH_PROMPT;
use std::env;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct Config {
    pub prompt: String,
}

impl Default for Config {
    fn default() -> Self {
        Config { prompt: SH_PROMPT.to_string() }
    }
}

impl Config {
    /// `DSH_PROMPT` overrides the prompt.
    pub fn from_env() -> Self {
        let mut cfg = Config::default();
        if let Ok(p) = env::var("DSH_PROMPT") {
            cfg.prompt = p;
        }
        cfg
    }
}

/// Installs a stderr `tracing` subscriber filtered by the directives in
/// `env_var`, falling back to `default_directive`.
pub fn init_logging(env_var: &str, default_directive: &str) {
    let filter = EnvFilter::try_from_env(env_var).unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

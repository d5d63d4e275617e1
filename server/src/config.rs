//! Server configuration.
//!
//! CLI arguments with environment variable fallbacks; every knob has a
//! sensible local-play default.

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::level_filters::LevelFilter;

use crate::room::DuplicatePolicy;

#[derive(Parser, Debug, Clone)]
#[command(name = "fourstack-server")]
#[command(about = "Real-time Connect Four WebSocket server")]
pub struct Config {
    /// Address to bind
    #[arg(long, env = "FOURSTACK_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind
    #[arg(long, env = "FOURSTACK_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Directory of static frontend files
    #[arg(long, env = "FOURSTACK_STATIC_DIR", default_value = "./static")]
    pub static_dir: String,

    /// What to do when a player id connects twice
    #[arg(
        long,
        env = "FOURSTACK_DUPLICATE_POLICY",
        value_enum,
        default_value_t = DuplicatePolicy::Replace
    )]
    pub duplicate_policy: DuplicatePolicy,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FOURSTACK_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.port == 0 {
            return Err(anyhow!("port must be greater than 0"));
        }
        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(anyhow!(
                "invalid log level '{}', expected one of trace, debug, info, warn, error",
                self.log_level
            ));
        }
        Ok(())
    }
}

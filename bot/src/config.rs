//! Bot configuration.

use std::fmt;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::level_filters::LevelFilter;

/// Which search strategy drives the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Strategy {
    /// Depth-bounded alpha-beta with a random leaf heuristic.
    Minimax,
    /// Monte Carlo tree search under a wall-clock budget.
    Mcts,
    /// Alpha-beta with rollout-memoized leaf evaluation.
    Hybrid,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Minimax => write!(f, "minimax"),
            Strategy::Mcts => write!(f, "mcts"),
            Strategy::Hybrid => write!(f, "hybrid"),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "fourstack-bot")]
#[command(about = "Automated opponent for the fourstack server")]
pub struct Config {
    /// WebSocket endpoint of the game room
    #[arg(
        long,
        env = "FOURSTACK_BOT_URL",
        default_value = "ws://127.0.0.1:8080/game"
    )]
    pub server_url: String,

    /// Player id to claim a seat with
    #[arg(long, env = "FOURSTACK_BOT_ID", default_value = "bot")]
    pub player_id: String,

    /// Search strategy
    #[arg(
        long,
        env = "FOURSTACK_BOT_STRATEGY",
        value_enum,
        default_value_t = Strategy::Minimax
    )]
    pub strategy: Strategy,

    /// Search depth in plies (minimax and hybrid)
    #[arg(long, default_value_t = 7)]
    pub depth: u32,

    /// Wall-clock budget per move in milliseconds (mcts)
    #[arg(long, default_value_t = 1000)]
    pub budget_ms: u64,

    /// Random rollouts per evaluated leaf (hybrid)
    #[arg(long, default_value_t = 10)]
    pub rollouts: u32,

    /// Win-ratio database path (hybrid)
    #[arg(
        long,
        env = "FOURSTACK_BOT_STORE",
        default_value = "./data/winratio.db"
    )]
    pub store_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FOURSTACK_BOT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.player_id.is_empty() {
            return Err(anyhow!("player_id cannot be empty"));
        }
        if !self.server_url.starts_with("ws://") && !self.server_url.starts_with("wss://") {
            return Err(anyhow!(
                "server_url must be a ws:// or wss:// endpoint, got '{}'",
                self.server_url
            ));
        }
        if self.depth == 0 {
            return Err(anyhow!("depth must be greater than 0"));
        }
        if self.budget_ms == 0 {
            return Err(anyhow!("budget_ms must be greater than 0"));
        }
        if self.rollouts == 0 {
            return Err(anyhow!("rollouts must be greater than 0"));
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

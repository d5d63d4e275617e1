//! fourstack bot
//!
//! Long-running process that claims one seat on a game room and plays it
//! with the configured search strategy until the connection drops.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use search::{
    HybridAgent, HybridConfig, MctsAgent, MctsConfig, MinimaxAgent, MinimaxConfig, SqliteWinStore,
};

mod config;
mod runtime;

use config::{Config, Strategy};
use runtime::AgentRuntime;

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    config.validate()?;
    init_tracing(&config.log_level)?;

    let url = format!("{}?userId={}", config.server_url, config.player_id);
    info!(
        player_id = %config.player_id,
        strategy = %config.strategy,
        "starting agent"
    );

    match config.strategy {
        Strategy::Minimax => {
            let agent = MinimaxAgent::new(
                &config.player_id,
                MinimaxConfig::default().with_depth(config.depth),
            );
            AgentRuntime::new(agent).run(&url).await
        }
        Strategy::Mcts => {
            let mcts_config =
                MctsConfig::default().with_budget(Duration::from_millis(config.budget_ms));
            let agent = MctsAgent::new(&config.player_id, mcts_config);
            AgentRuntime::new(agent).run(&url).await
        }
        Strategy::Hybrid => {
            let store = SqliteWinStore::open(&config.store_path)?;
            let hybrid_config = HybridConfig::default()
                .with_depth(config.depth)
                .with_rollouts(config.rollouts);
            let agent = HybridAgent::new(&config.player_id, hybrid_config, store);
            AgentRuntime::new(agent).run(&url).await
        }
    }
}

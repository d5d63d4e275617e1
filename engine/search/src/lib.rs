//! Adversarial search strategies for the Connect Four server.
//!
//! Three interchangeable agents, all speaking the `agent-core` contract
//! over JSON snapshots:
//!
//! - [`MinimaxAgent`]: depth-bounded alpha-beta with a pluggable leaf
//!   evaluator (random by default).
//! - [`MctsAgent`]: Monte Carlo tree search under a wall-clock budget, with
//!   a tree that persists across moves of one process.
//! - [`HybridAgent`]: alpha-beta whose leaves are scored by random rollouts
//!   memoized in a durable win-ratio store.
//!
//! Each `generate_action` call rebuilds a private [`SearchState`] from the
//! latest snapshot; nothing is shared between concurrent searches.

pub mod client;
pub mod config;
pub mod hybrid;
pub mod mcts;
pub mod minimax;
pub mod state;
pub mod store;

pub use client::{BoardState, ClientAction};
pub use config::{HybridConfig, MctsConfig, MinimaxConfig};
pub use hybrid::{HybridAgent, RolloutEvaluator};
pub use mcts::MctsAgent;
pub use minimax::{Evaluator, MinimaxAgent, RandomEvaluator};
pub use state::SearchState;
pub use store::{MemoryWinStore, SqliteWinStore, StoreError, WinRatio, WinStore};

use thiserror::Error;

/// Errors surfaced by a search run.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("win store failure: {0}")]
    Store(#[from] StoreError),
}

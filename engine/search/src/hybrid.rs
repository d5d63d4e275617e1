//! Alpha-beta search with rollout-memoized leaf evaluation.
//!
//! Near-term tactics stay exact (the minimax layer); the horizon is scored
//! statistically. Each evaluated leaf runs a handful of random rollouts,
//! crediting every position along each rollout path in the durable win-ratio
//! store, then reads back the leaf's own accumulated ratio as its score. The
//! store compounds across searches and games, so the heuristic sharpens the
//! longer an agent runs.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, error};

use agent_core::{Agent, State};
use games_connectfour::Color;

use crate::client::{can_act, BoardState, ClientAction};
use crate::config::HybridConfig;
use crate::minimax::{Evaluator, Minimax};
use crate::state::SearchState;
use crate::store::{StoreError, WinStore};
use crate::SearchError;

/// Leaf evaluator backed by random rollouts and a win-ratio store.
pub struct RolloutEvaluator<S> {
    store: S,
    rollouts: u32,
    /// Leaf scores already computed within the current move generation.
    memo: HashMap<String, i32>,
    rng: ChaCha20Rng,
}

impl<S: WinStore> RolloutEvaluator<S> {
    pub fn new(store: S, rollouts: u32) -> Self {
        Self {
            store,
            rollouts,
            memo: HashMap::new(),
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    pub fn with_seed(store: S, rollouts: u32, seed: u64) -> Self {
        Self {
            store,
            rollouts,
            memo: HashMap::new(),
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Forget the transient memo. Called at the start of each move
    /// generation; the backing store is untouched.
    pub fn clear_memo(&mut self) {
        self.memo.clear();
    }

    /// Play one random game to a terminal state, crediting every visited
    /// position (from the agent's perspective) in the store. Returns the
    /// win contribution: 1 if the agent won the playout, else 0.
    fn rollout(&mut self, state: &mut SearchState) -> Result<u32, StoreError> {
        let start = state.depth();
        let mut path_keys: Vec<String> = Vec::new();

        let outcome = loop {
            let key = state.canonical_key();
            if let Some(victor) = state.winner() {
                let win = u32::from(victor == state.agent());
                self.store.upsert(&key, win)?;
                break win;
            }
            let moves = state.legal_moves();
            match moves.choose(&mut self.rng) {
                Some(&m) => {
                    path_keys.push(key);
                    state.make(m);
                }
                // Drawn playout: no win credit anywhere on the path.
                None => break 0,
            }
        };
        state.rewind(start);

        for key in &path_keys {
            self.store.upsert(key, outcome)?;
        }
        Ok(outcome)
    }
}

impl<S: WinStore> Evaluator for RolloutEvaluator<S> {
    fn evaluate(&mut self, state: &mut SearchState) -> Result<i32, SearchError> {
        let key = state.canonical_key();
        if let Some(&score) = self.memo.get(&key) {
            return Ok(score);
        }

        for _ in 0..self.rollouts {
            self.rollout(state)?;
        }

        let ratio = self.store.read(&key)?;
        let score = (ratio.ratio() * 100.0) as i32;
        self.memo.insert(key, score);
        Ok(score)
    }
}

/// Minimax agent whose horizon is scored by memoized rollouts.
pub struct HybridAgent<S> {
    player_id: String,
    rematch_sent: bool,
    search: Minimax<RolloutEvaluator<S>>,
}

impl<S: WinStore> HybridAgent<S> {
    pub fn new(player_id: impl Into<String>, config: HybridConfig, store: S) -> Self {
        let evaluator = RolloutEvaluator::new(store, config.rollouts);
        Self {
            player_id: player_id.into(),
            rematch_sent: false,
            search: Minimax::new(config.minimax(), evaluator),
        }
    }

    pub fn with_seed(
        player_id: impl Into<String>,
        config: HybridConfig,
        store: S,
        seed: u64,
    ) -> Self {
        let evaluator = RolloutEvaluator::with_seed(store, config.rollouts, seed);
        Self {
            player_id: player_id.into(),
            rematch_sent: false,
            search: Minimax::new(config.minimax(), evaluator),
        }
    }

    pub fn evaluator(&mut self) -> &mut RolloutEvaluator<S> {
        self.search.evaluator_mut()
    }
}

impl<S: WinStore + Send> Agent for HybridAgent<S> {
    type State = BoardState;

    fn base_state(&self) -> BoardState {
        BoardState::new()
    }

    fn can_act(&self, state: &BoardState) -> bool {
        can_act(state, &self.player_id, self.rematch_sent)
    }

    fn generate_action(&mut self, state: &BoardState) -> ClientAction {
        let actions = state.legal_actions();
        if actions[0].is_rematch() {
            self.rematch_sent = true;
            return ClientAction::Rematch;
        }
        self.rematch_sent = false;

        let color: Color = state
            .color_of(&self.player_id)
            .expect("agent has no seat in the snapshot");
        let mut search_state = SearchState::from_snapshot(state.snapshot(), color);

        self.search.evaluator_mut().clear_memo();
        match self.search.best_move(&mut search_state) {
            Ok((col, score)) => {
                debug!(col, score, "hybrid search chose column");
                ClientAction::Drop(col)
            }
            Err(e) => {
                error!(error = %e, "win store unavailable, falling back to first legal move");
                actions[0]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::State;
    use games_connectfour::wire::Snapshot;
    use games_connectfour::{GameState, Seats, BLACK, RED};

    use crate::store::MemoryWinStore;

    fn two_seat_snapshot(state: &GameState) -> Snapshot {
        let mut seats = Seats::new();
        seats.join("me").unwrap();
        seats.join("them").unwrap();
        Snapshot::new(state.clone(), seats.players())
    }

    fn search_state(game: &GameState, color: u8) -> SearchState {
        SearchState::from_snapshot(&two_seat_snapshot(game), color)
    }

    #[test]
    fn rollout_credits_a_terminal_position() {
        // Game already won by RED; the agent IS red.
        let mut game = GameState::new();
        for _ in 0..3 {
            game.apply_move(RED, 3).unwrap();
            game.apply_move(BLACK, 0).unwrap();
        }
        game.apply_move(RED, 3).unwrap();

        let mut state = search_state(&game, RED);
        let key = state.canonical_key();
        let mut evaluator = RolloutEvaluator::with_seed(MemoryWinStore::new(), 1, 0);

        let win = evaluator.rollout(&mut state).unwrap();
        assert_eq!(win, 1);

        let ratio = evaluator.store().read(&key).unwrap();
        assert_eq!(ratio.wins, 1);
        assert_eq!(ratio.total, 1);
    }

    #[test]
    fn evaluate_runs_the_configured_rollouts_and_reads_back() {
        let game = GameState::new();
        let mut state = search_state(&game, RED);
        let key = state.canonical_key();

        let mut evaluator = RolloutEvaluator::with_seed(MemoryWinStore::new(), 5, 9);
        let score = evaluator.evaluate(&mut state).unwrap();

        // Every rollout passes through the leaf itself first.
        let ratio = evaluator.store().read(&key).unwrap();
        assert_eq!(ratio.total, 5);
        assert!((0..=100).contains(&score));
        // The board is back where it started.
        assert_eq!(state.canonical_key(), key);
        assert_eq!(state.depth(), 0);
    }

    #[test]
    fn memo_short_circuits_within_one_generation() {
        let game = GameState::new();
        let mut state = search_state(&game, RED);
        let key = state.canonical_key();

        let mut evaluator = RolloutEvaluator::with_seed(MemoryWinStore::new(), 3, 2);
        let first = evaluator.evaluate(&mut state).unwrap();
        let total_after_first = evaluator.store().read(&key).unwrap().total;

        let second = evaluator.evaluate(&mut state).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            evaluator.store().read(&key).unwrap().total,
            total_after_first,
            "memo hit must not re-roll"
        );

        // Clearing the memo re-rolls and accumulates further.
        evaluator.clear_memo();
        evaluator.evaluate(&mut state).unwrap();
        assert!(evaluator.store().read(&key).unwrap().total > total_after_first);
    }

    #[test]
    fn statistics_compound_across_searches() {
        let game = GameState::new();
        let bytes = two_seat_snapshot(&game).to_bytes().unwrap();
        let mut board = BoardState::new();
        board.apply_update(&bytes).unwrap();

        let config = HybridConfig::default().with_depth(2).with_rollouts(2);
        let mut agent = HybridAgent::with_seed("me", config, MemoryWinStore::new(), 4);

        agent.generate_action(&board);
        let after_first = agent.evaluator().store().len();
        assert!(after_first > 0);

        agent.generate_action(&board);
        assert!(agent.evaluator().store().len() >= after_first);
    }

    #[test]
    fn hybrid_takes_an_immediate_win() {
        let mut game = GameState::new();
        for _ in 0..3 {
            game.apply_move(RED, 5).unwrap();
            game.apply_move(BLACK, 1).unwrap();
        }
        let bytes = two_seat_snapshot(&game).to_bytes().unwrap();
        let mut board = BoardState::new();
        board.apply_update(&bytes).unwrap();

        let config = HybridConfig::default().with_depth(4).with_rollouts(2);
        let mut agent = HybridAgent::with_seed("me", config, MemoryWinStore::new(), 13);

        assert!(agent.can_act(&board));
        assert_eq!(agent.generate_action(&board), ClientAction::Drop(5));
    }
}

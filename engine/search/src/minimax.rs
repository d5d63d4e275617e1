//! Depth-bounded alpha-beta minimax over a reversible search board.
//!
//! Scores are always from the searching agent's perspective: a win is worth
//! more the sooner it lands, a loss costs more the sooner it is forced, a
//! draw is mildly bad, and anything else at the horizon is delegated to a
//! pluggable leaf [`Evaluator`].

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::{debug, error};

use agent_core::{Agent, State};
use games_connectfour::Color;

use crate::client::{can_act, BoardState, ClientAction};
use crate::config::MinimaxConfig;
use crate::state::SearchState;
use crate::SearchError;

/// Terminal and bound scores, agent-perspective.
pub const WIN_SCORE: i32 = 1000;
pub const LOSS_SCORE: i32 = -1000;
pub const DRAW_SCORE: i32 = -100;
const SCORE_FLOOR: i32 = -10_000_000;
const SCORE_CEIL: i32 = 10_000_000;

/// Scores a quiet horizon position from the searching agent's perspective.
pub trait Evaluator {
    fn evaluate(&mut self, state: &mut SearchState) -> Result<i32, SearchError>;
}

/// Baseline heuristic: a uniform random score in `0..100`. Cheap, and good
/// enough to break ties once the exact near-term tactics are searched.
pub struct RandomEvaluator {
    rng: ChaCha20Rng,
}

impl RandomEvaluator {
    pub fn new() -> Self {
        Self {
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for RandomEvaluator {
    fn evaluate(&mut self, _state: &mut SearchState) -> Result<i32, SearchError> {
        Ok(self.rng.gen_range(0..100))
    }
}

/// Alpha-beta search with make/unmake move reversal.
pub struct Minimax<E> {
    config: MinimaxConfig,
    evaluator: E,
}

impl<E: Evaluator> Minimax<E> {
    pub fn new(config: MinimaxConfig, evaluator: E) -> Self {
        Self { config, evaluator }
    }

    pub fn evaluator_mut(&mut self) -> &mut E {
        &mut self.evaluator
    }

    /// Pick the best column for the side to move (the searching agent).
    pub fn best_move(&mut self, state: &mut SearchState) -> Result<(usize, i32), SearchError> {
        let depth = self.config.depth;
        self.max_value(state, SCORE_FLOOR, SCORE_CEIL, 0, depth)
    }

    fn score(&mut self, state: &mut SearchState, depth: u32) -> Result<i32, SearchError> {
        if let Some(victor) = state.winner() {
            return Ok(if victor == state.agent() {
                WIN_SCORE + depth as i32
            } else {
                LOSS_SCORE - depth as i32
            });
        }
        if state.is_full() {
            return Ok(DRAW_SCORE);
        }
        self.evaluator.evaluate(state)
    }

    fn max_value(
        &mut self,
        state: &mut SearchState,
        mut alpha: i32,
        beta: i32,
        prev: usize,
        depth: u32,
    ) -> Result<(usize, i32), SearchError> {
        if depth == 0 || state.winner().is_some() || state.is_full() {
            return Ok((prev, self.score(state, depth)?));
        }
        let moves = state.legal_moves();
        let mut best_action = first_move(&moves);
        let mut best_score = SCORE_FLOOR;

        for action in moves {
            state.make(action);
            let result = self.min_value(state, alpha, beta, action, depth - 1);
            state.unmake();
            let (_, score) = result?;
            if score > best_score {
                best_action = action;
                best_score = score;
                alpha = alpha.max(best_score);
                if alpha >= beta {
                    break;
                }
            }
        }
        Ok((best_action, best_score))
    }

    fn min_value(
        &mut self,
        state: &mut SearchState,
        alpha: i32,
        mut beta: i32,
        prev: usize,
        depth: u32,
    ) -> Result<(usize, i32), SearchError> {
        if depth == 0 || state.winner().is_some() || state.is_full() {
            return Ok((prev, self.score(state, depth)?));
        }
        let moves = state.legal_moves();
        let mut best_action = first_move(&moves);
        let mut best_score = SCORE_CEIL;

        for action in moves {
            state.make(action);
            let result = self.max_value(state, alpha, beta, action, depth - 1);
            state.unmake();
            let (_, score) = result?;
            if score < best_score {
                best_action = action;
                best_score = score;
                beta = beta.min(best_score);
                if alpha >= beta {
                    break;
                }
            }
        }
        Ok((best_action, best_score))
    }
}

fn first_move(moves: &[usize]) -> usize {
    *moves
        .first()
        .expect("no legal moves in a live position: rules and search state diverged")
}

/// Alpha-beta agent with the random baseline evaluator.
pub struct MinimaxAgent {
    player_id: String,
    rematch_sent: bool,
    search: Minimax<RandomEvaluator>,
}

impl MinimaxAgent {
    pub fn new(player_id: impl Into<String>, config: MinimaxConfig) -> Self {
        Self {
            player_id: player_id.into(),
            rematch_sent: false,
            search: Minimax::new(config, RandomEvaluator::new()),
        }
    }

    pub fn with_seed(player_id: impl Into<String>, config: MinimaxConfig, seed: u64) -> Self {
        Self {
            player_id: player_id.into(),
            rematch_sent: false,
            search: Minimax::new(config, RandomEvaluator::with_seed(seed)),
        }
    }
}

impl Agent for MinimaxAgent {
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

        match self.search.best_move(&mut search_state) {
            Ok((col, score)) => {
                debug!(col, score, "alpha-beta chose column");
                ClientAction::Drop(col)
            }
            Err(e) => {
                error!(error = %e, "search failed, falling back to first legal move");
                actions[0]
            }
        }
    }
}

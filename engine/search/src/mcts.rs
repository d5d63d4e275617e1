//! Monte Carlo tree search with a process-lifetime statistics tree.
//!
//! The tree is arena-allocated (nodes in a contiguous `Vec`, addressed by
//! `NodeId`) and owned by the agent, so statistics gathered for one move are
//! reused by every later search that reaches the same position. Positions
//! are indexed by their canonical board key.
//!
//! Each iteration runs the four classic phases: UCT selection down the
//! known tree, expansion of exactly one new child, a uniformly random
//! rollout to a terminal state, and backpropagation along parent links.

use std::collections::HashMap;
use std::time::Instant;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::debug;

use agent_core::{Agent, State};
use games_connectfour::Color;

use crate::client::{can_act, BoardState, ClientAction};
use crate::config::MctsConfig;
use crate::state::SearchState;

/// Index into the node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    pub fn is_some(self) -> bool {
        !self.is_none()
    }
}

/// Visit statistics for one reached position.
#[derive(Debug, Clone)]
pub struct StatsNode {
    /// Parent in the tree; NONE for a root created cold.
    pub parent: NodeId,
    /// Color that played the move leading here; -1 for a cold root.
    pub mover: i8,
    /// Column that produced this node from its parent.
    pub action: Option<usize>,
    /// Rollouts through this node won by `mover`.
    pub wins: u32,
    /// Rollouts through this node.
    pub total: u32,
    pub children: Vec<(usize, NodeId)>,
}

impl StatsNode {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.wins as f64 / self.total as f64
        }
    }

    fn child(&self, action: usize) -> Option<NodeId> {
        self.children
            .iter()
            .find(|(a, _)| *a == action)
            .map(|(_, id)| *id)
    }
}

/// Arena tree plus the canonical-key index that persists across searches.
#[derive(Debug, Default)]
pub struct SearchTree {
    nodes: Vec<StatsNode>,
    index: HashMap<String, NodeId>,
}

impl SearchTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> &StatsNode {
        &self.nodes[id.0 as usize]
    }

    fn get_mut(&mut self, id: NodeId) -> &mut StatsNode {
        &mut self.nodes[id.0 as usize]
    }

    pub fn node_for(&self, key: &str) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    /// Node for the given position, creating a detached root if this board
    /// has never been seen. An existing node keeps its accumulated stats.
    pub fn root_for(&mut self, key: &str) -> NodeId {
        if let Some(id) = self.index.get(key) {
            return *id;
        }
        let id = self.allocate(StatsNode {
            parent: NodeId::NONE,
            mover: -1,
            action: None,
            wins: 0,
            total: 0,
            children: Vec::new(),
        });
        self.index.insert(key.to_string(), id);
        id
    }

    fn allocate(&mut self, node: StatsNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Create the single new child of one expansion step and register it
    /// under the child position's canonical key.
    fn add_child(&mut self, parent: NodeId, action: usize, mover: i8, key: &str) -> NodeId {
        let id = self.allocate(StatsNode {
            parent,
            mover,
            action: Some(action),
            wins: 0,
            total: 0,
            children: Vec::new(),
        });
        self.get_mut(parent).children.push((action, id));
        self.index.insert(key.to_string(), id);
        id
    }

    /// Walk from `from` to the root via parent links. Every node on the
    /// path counts the visit; a node whose mover matches the rollout winner
    /// counts the win.
    fn backpropagate(&mut self, from: NodeId, winner: Option<i8>) {
        let mut current = from;
        while current.is_some() {
            let node = self.get_mut(current);
            node.total += 1;
            if winner == Some(node.mover) {
                node.wins += 1;
            }
            current = node.parent;
        }
    }

    /// UCT child selection among a fully-expanded node's children.
    fn select_uct(&self, parent: NodeId, exploration: f64) -> NodeId {
        let node = self.get(parent);
        let parent_total = node.total.max(1) as f64;

        let mut best = node.children[0].1;
        let mut best_score = f64::NEG_INFINITY;
        for &(_, child_id) in &node.children {
            let child = self.get(child_id);
            let score = if child.total == 0 {
                f64::INFINITY
            } else {
                child.ratio() + exploration * (parent_total.ln() / child.total as f64).sqrt()
            };
            if score > best_score {
                best = child_id;
                best_score = score;
            }
        }
        best
    }
}

/// Monte Carlo tree search agent.
pub struct MctsAgent {
    player_id: String,
    rematch_sent: bool,
    config: MctsConfig,
    tree: SearchTree,
    rng: ChaCha20Rng,
}

impl MctsAgent {
    pub fn new(player_id: impl Into<String>, config: MctsConfig) -> Self {
        Self {
            player_id: player_id.into(),
            rematch_sent: false,
            config,
            tree: SearchTree::new(),
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    pub fn with_seed(player_id: impl Into<String>, config: MctsConfig, seed: u64) -> Self {
        Self {
            player_id: player_id.into(),
            rematch_sent: false,
            config,
            tree: SearchTree::new(),
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    pub fn tree(&self) -> &SearchTree {
        &self.tree
    }

    /// Run iterations until the wall-clock budget (or iteration cap) is
    /// spent, then pick the root child with the best win ratio. Positions
    /// with no usable statistics fall back to a uniformly random legal move.
    pub fn choose_column(&mut self, state: &mut SearchState) -> usize {
        let root = self.tree.root_for(&state.canonical_key());
        let deadline = Instant::now() + self.config.budget;

        let mut iterations = 0u32;
        while Instant::now() < deadline {
            if let Some(cap) = self.config.max_iterations {
                if iterations >= cap {
                    break;
                }
            }
            self.simulate(root, state);
            iterations += 1;
        }
        debug!(
            iterations,
            nodes = self.tree.len(),
            root_visits = self.tree.get(root).total,
            "search budget spent"
        );

        let mut best: Option<(usize, f64)> = None;
        for &(action, child_id) in &self.tree.get(root).children {
            let ratio = self.tree.get(child_id).ratio();
            if best.map_or(true, |(_, b)| ratio > b) {
                best = Some((action, ratio));
            }
        }
        match best {
            Some((action, ratio)) if ratio > 0.0 => action,
            _ => {
                let moves = state.legal_moves();
                *moves
                    .choose(&mut self.rng)
                    .expect("no legal moves in a live position: rules and search state diverged")
            }
        }
    }

    /// One iteration: selection, expansion, rollout, backpropagation. The
    /// shared board is always rewound to its entry depth before returning.
    fn simulate(&mut self, root: NodeId, state: &mut SearchState) {
        let start = state.depth();
        let mut current = root;

        loop {
            if let Some(victor) = state.winner() {
                self.tree.backpropagate(current, Some(victor));
                break;
            }
            if state.is_full() {
                self.tree.backpropagate(current, None);
                break;
            }

            let moves = state.legal_moves();
            let untried: Vec<usize> = {
                let node = self.tree.get(current);
                moves
                    .iter()
                    .copied()
                    .filter(|&m| node.child(m).is_none())
                    .collect()
            };

            if !untried.is_empty() {
                let &action = untried.choose(&mut self.rng).unwrap();
                state.make(action);
                let mover = 1 - state.turn();
                let key = state.canonical_key();
                let child = self.tree.add_child(current, action, mover, &key);
                let winner = rollout(state, &mut self.rng);
                self.tree.backpropagate(child, winner);
                break;
            }

            let next = self.tree.select_uct(current, self.config.exploration);
            let action = self.tree.get(next).action.expect("non-root child has an action");
            state.make(action);
            current = next;
        }

        state.rewind(start);
    }
}

/// Play uniformly random legal moves to a terminal state. Returns the
/// winning color, or `None` for a drawn (full) board. The state is rewound
/// before returning.
fn rollout(state: &mut SearchState, rng: &mut ChaCha20Rng) -> Option<i8> {
    let start = state.depth();
    let result = loop {
        if let Some(victor) = state.winner() {
            break Some(victor);
        }
        let moves = state.legal_moves();
        match moves.choose(rng) {
            Some(&m) => state.make(m),
            None => break None,
        }
    };
    state.rewind(start);
    result
}

impl Agent for MctsAgent {
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
        if actions.len() == 1 {
            return actions[0];
        }

        let color: Color = state
            .color_of(&self.player_id)
            .expect("agent has no seat in the snapshot");
        let mut search_state = SearchState::from_snapshot(state.snapshot(), color);
        let col = self.choose_column(&mut search_state);
        debug!(col, "tree search chose column");
        ClientAction::Drop(col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use games_connectfour::wire::Snapshot;
    use games_connectfour::{GameState, Seats, BLACK, RED};

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
    fn rollout_reports_an_existing_win_and_rewinds() {
        let mut game = GameState::new();
        for _ in 0..3 {
            game.apply_move(RED, 3).unwrap();
            game.apply_move(BLACK, 0).unwrap();
        }
        game.apply_move(RED, 3).unwrap();

        let mut state = search_state(&game, BLACK);
        let key = state.canonical_key();
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        assert_eq!(rollout(&mut state, &mut rng), Some(RED as i8));
        assert_eq!(state.canonical_key(), key);
    }

    #[test]
    fn visit_totals_grow_monotonically() {
        let game = GameState::new();
        let mut state = search_state(&game, RED);
        let key = state.canonical_key();

        let config = MctsConfig::default()
            .with_budget(Duration::from_secs(30))
            .with_max_iterations(50);
        let mut agent = MctsAgent::with_seed("me", config, 42);

        agent.choose_column(&mut state);
        let root = agent.tree().node_for(&key).unwrap();
        let after_first = agent.tree().get(root).total;
        assert_eq!(after_first, 50, "one backpropagation per iteration");

        // A second search from the same position reuses and extends the
        // same statistics.
        agent.choose_column(&mut state);
        let after_second = agent.tree().get(root).total;
        assert_eq!(after_second, 100);
    }

    #[test]
    fn expansion_adds_one_node_per_iteration_at_most() {
        let game = GameState::new();
        let mut state = search_state(&game, RED);

        let config = MctsConfig::default()
            .with_budget(Duration::from_secs(30))
            .with_max_iterations(25);
        let mut agent = MctsAgent::with_seed("me", config, 7);
        agent.choose_column(&mut state);

        // Root plus at most one expanded child per iteration.
        assert!(agent.tree().len() <= 26);
        assert!(agent.tree().len() > 1);
    }

    #[test]
    fn finds_the_immediate_win() {
        // RED has three in column 5 and moves next.
        let mut game = GameState::new();
        for _ in 0..3 {
            game.apply_move(RED, 5).unwrap();
            game.apply_move(BLACK, 1).unwrap();
        }
        let mut state = search_state(&game, RED);

        let config = MctsConfig::default()
            .with_budget(Duration::from_secs(30))
            .with_max_iterations(2000);
        let mut agent = MctsAgent::with_seed("me", config, 11);
        assert_eq!(agent.choose_column(&mut state), 5);
    }

    #[test]
    fn falls_back_to_a_random_legal_move_without_statistics() {
        let game = GameState::new();
        let mut state = search_state(&game, RED);

        let config = MctsConfig::default().with_max_iterations(0);
        let mut agent = MctsAgent::with_seed("me", config, 3);
        let col = agent.choose_column(&mut state);
        assert!(state.legal_moves().contains(&col));
    }

    #[test]
    fn search_leaves_the_state_unchanged() {
        let game = GameState::new();
        let mut state = search_state(&game, RED);
        let key = state.canonical_key();

        let config = MctsConfig::for_testing();
        let mut agent = MctsAgent::with_seed("me", config, 5);
        agent.choose_column(&mut state);
        assert_eq!(state.canonical_key(), key);
        assert_eq!(state.depth(), 0);
    }
}

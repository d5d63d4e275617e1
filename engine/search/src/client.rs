//! Concrete agent-side state and action for Connect Four.
//!
//! One implementation of the `agent-core` traits shared by every strategy.

use agent_core::{Action, ProtocolError, State};
use games_connectfour::wire::{MovePayload, Snapshot};
use games_connectfour::{Color, HEIGHT};

/// Snapshot-backed view of the game from one player's connection.
#[derive(Debug, Clone, Default)]
pub struct BoardState {
    snapshot: Snapshot,
}

impl BoardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn color_of(&self, player_id: &str) -> Option<Color> {
        self.snapshot.players.get(player_id).copied()
    }

    /// The game is over or the board is full: either way no ordinary move
    /// remains and the only thing left to do is vote for a rematch.
    pub fn is_ended(&self) -> bool {
        self.snapshot.state.game_over
            || self
                .snapshot
                .state
                .columns
                .iter()
                .all(|c| c.len() >= HEIGHT)
    }
}

impl State for BoardState {
    type Action = ClientAction;

    fn apply_update(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        self.snapshot =
            Snapshot::from_bytes(payload).map_err(|e| ProtocolError::BadSnapshot(e.to_string()))?;
        Ok(())
    }

    fn legal_actions(&self) -> Vec<ClientAction> {
        if self.snapshot.state.game_over {
            return vec![ClientAction::Rematch];
        }
        let drops: Vec<ClientAction> = self
            .snapshot
            .state
            .columns
            .iter()
            .enumerate()
            .filter(|(_, col)| col.len() < HEIGHT)
            .map(|(i, _)| ClientAction::Drop(i))
            .collect();
        if drops.is_empty() {
            return vec![ClientAction::Rematch];
        }
        drops
    }
}

/// A move an agent sends back: a column drop or a rematch vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAction {
    Drop(usize),
    Rematch,
}

impl ClientAction {
    pub fn is_rematch(&self) -> bool {
        matches!(self, ClientAction::Rematch)
    }
}

impl Action for ClientAction {
    fn to_payload(&self) -> Result<Vec<u8>, ProtocolError> {
        let payload = match *self {
            ClientAction::Drop(col) => MovePayload::drop(col),
            ClientAction::Rematch => MovePayload::rematch(),
        };
        payload
            .to_bytes()
            .map_err(|e| ProtocolError::BadAction(e.to_string()))
    }
}

/// Shared `can_act` rule: my turn in a live game, or the game has ended and
/// my rematch vote is still outstanding.
pub(crate) fn can_act(state: &BoardState, player_id: &str, rematch_sent: bool) -> bool {
    let ended = state.is_ended();
    let my_turn = state.color_of(player_id) == Some(state.snapshot().state.current_turn);
    (my_turn && !ended) || (ended && !rematch_sent)
}

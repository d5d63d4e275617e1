//! Capability contract between games and automated agents.
//!
//! Three traits decouple a search strategy and its connection runtime from
//! any concrete game: a [`State`] that can absorb wire snapshots and
//! enumerate what is legal, an [`Action`] that can put itself back on the
//! wire, and an [`Agent`] that decides if and what to play. Strategies and
//! the runtime compile against these traits only; the game plugs in at the
//! edges.

use thiserror::Error;

/// Errors crossing the wire boundary.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed snapshot payload: {0}")]
    BadSnapshot(String),

    #[error("failed to encode action: {0}")]
    BadAction(String),
}

/// An agent-side view of the game, fed by serialized snapshots.
pub trait State: Send {
    type Action: Action;

    /// Absorb one wire snapshot in place, replacing the previous view.
    fn apply_update(&mut self, payload: &[u8]) -> Result<(), ProtocolError>;

    /// Everything playable right now. When the game has ended, or no
    /// ordinary move remains, this is exactly one rematch-request action.
    fn legal_actions(&self) -> Vec<Self::Action>;
}

/// A move an agent can place on the wire.
pub trait Action: Send {
    fn to_payload(&self) -> Result<Vec<u8>, ProtocolError>;
}

/// Something that decides moves from observed state.
pub trait Agent: Send {
    type State: State;

    /// A fresh, empty state to deserialize into before the first snapshot.
    fn base_state(&self) -> Self::State;

    /// True when this agent should act: its turn in a live game, or the
    /// game has ended and it has not yet cast its rematch vote.
    fn can_act(&self, state: &Self::State) -> bool;

    /// Choose a move. Only called after `can_act` returned true.
    fn generate_action(&mut self, state: &Self::State) -> <Self::State as State>::Action;
}

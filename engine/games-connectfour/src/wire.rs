//! Wire payloads exchanged over a game connection.
//!
//! One snapshot or one move per message, JSON encoded. Field names are
//! PascalCase to stay compatible with the original browser frontend.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Color, GameState};

/// Complete, self-contained copy of the game broadcast to every observer
/// after each accepted command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Snapshot {
    #[serde(flatten)]
    pub state: GameState,
    /// Player id to assigned color, for every occupied seat.
    pub players: HashMap<String, Color>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            state: GameState::new(),
            players: HashMap::new(),
        }
    }
}

impl Snapshot {
    pub fn new(state: GameState, players: HashMap<String, Color>) -> Self {
        Self { state, players }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// A player's input: either a column drop or a rematch vote.
///
/// `col` of -1 (the default when omitted) means "no ordinary move".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MovePayload {
    #[serde(default = "no_column")]
    pub col: i32,
    #[serde(default)]
    pub rematch: bool,
}

fn no_column() -> i32 {
    -1
}

impl MovePayload {
    pub fn drop(col: usize) -> Self {
        Self {
            col: col as i32,
            rematch: false,
        }
    }

    pub fn rematch() -> Self {
        Self {
            col: -1,
            rematch: true,
        }
    }

    /// A payload that names neither a column nor a rematch carries nothing
    /// actionable and is discarded before it reaches the rules engine.
    pub fn is_noop(&self) -> bool {
        self.col < 0 && !self.rematch
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

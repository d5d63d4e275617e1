//! Connect Four rules engine
//!
//! Pure, synchronous game rules: board mutation, turn order, win and draw
//! detection, and the two-seat bookkeeping (colors by join order, rematch
//! votes). All concurrency lives above this crate; nothing here blocks or
//! spawns.
//!
//! # Board Layout
//!
//! The board is a fixed array of 7 columns. Each column is an append-only
//! stack of at most 6 pieces, index 0 at the bottom:
//!
//! ```text
//! Row 5:  .  .  .  .  .  .  .   <- Top
//! Row 0:  R  B  .  .  .  .  .   <- Bottom (first pieces dropped)
//!        Col 0  1  2  3  4  5  6
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod wire;

/// Board dimensions.
pub const WIDTH: usize = 7;
pub const HEIGHT: usize = 6;

/// Piece / player color. First joiner plays RED and moves first.
pub type Color = u8;
pub const RED: Color = 0;
pub const BLACK: Color = 1;

/// A single cell coordinate. Row 0 is the bottom of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

/// Errors reported for rejected commands.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RulesError {
    #[error("not this color's turn")]
    WrongTurn,

    #[error("column {0} is not playable")]
    IllegalColumn(usize),

    #[error("game already has two players")]
    GameFull,

    #[error("no player in game with id {0}")]
    UnknownPlayer(String),
}

/// Complete board state. Owned exclusively by one game session; replaced
/// wholesale on a confirmed rematch rather than mutated field-by-field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GameState {
    /// Color whose move is expected next.
    pub current_turn: Color,
    /// One ordered piece stack per column, bottom first.
    pub columns: Vec<Vec<Color>>,
    pub game_over: bool,
    /// The four cells of the winning line, empty while the game runs.
    #[serde(default)]
    pub winning_positions: Vec<Position>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    pub fn new() -> Self {
        Self {
            current_turn: RED,
            columns: vec![Vec::new(); WIDTH],
            game_over: false,
            winning_positions: Vec::new(),
        }
    }

    /// Apply one move for `color` into `col`.
    ///
    /// Rejects out-of-turn and unplayable-column moves. A move after the
    /// game has ended is accepted without mutating anything, so a laggy
    /// client does not get an error for a race it could not avoid.
    pub fn apply_move(&mut self, color: Color, col: usize) -> Result<(), RulesError> {
        if color != self.current_turn {
            return Err(RulesError::WrongTurn);
        }
        if col >= WIDTH || self.columns[col].len() >= HEIGHT {
            return Err(RulesError::IllegalColumn(col));
        }
        if self.game_over {
            return Ok(());
        }

        self.current_turn = BLACK - self.current_turn;
        self.columns[col].push(color);

        if let Some(line) = self.check_win(col) {
            self.game_over = true;
            self.winning_positions = line;
        }
        Ok(())
    }

    /// Piece at (col, row), if that cell is filled.
    fn piece_at(&self, col: i32, row: i32) -> Option<Color> {
        if col < 0 || col >= WIDTH as i32 || row < 0 || row >= HEIGHT as i32 {
            return None;
        }
        self.columns[col as usize].get(row as usize).copied()
    }

    /// Check for a four-in-a-row line through the top piece of `col`.
    ///
    /// Only lines passing through the just-played cell can be new, so each
    /// direction is a bounded scan anchored there rather than a full-board
    /// rescan.
    pub fn check_win(&self, col: usize) -> Option<Vec<Position>> {
        if col >= WIDTH {
            return None;
        }
        let row = self.columns[col].len().checked_sub(1)?;
        let color = self.columns[col][row];

        // vertical, horizontal, both diagonals
        const DIRECTIONS: [(i32, i32); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

        for (dc, dr) in DIRECTIONS {
            let mut run = vec![(col as i32, row as i32)];
            for sign in [1i32, -1] {
                let (mut c, mut r) = (col as i32 + sign * dc, row as i32 + sign * dr);
                while self.piece_at(c, r) == Some(color) {
                    if sign > 0 {
                        run.push((c, r));
                    } else {
                        run.insert(0, (c, r));
                    }
                    c += sign * dc;
                    r += sign * dr;
                }
            }
            if run.len() >= 4 {
                let anchor = run
                    .iter()
                    .position(|&(c, r)| c == col as i32 && r == row as i32)
                    .unwrap_or(0);
                let start = anchor.min(run.len() - 4);
                return Some(
                    run[start..start + 4]
                        .iter()
                        .map(|&(c, r)| Position {
                            col: c as usize,
                            row: r as usize,
                        })
                        .collect(),
                );
            }
        }
        None
    }

    /// Draw: every column full and no winning line was ever found.
    pub fn is_stalemate(&self) -> bool {
        !self.game_over && self.columns.iter().all(|c| c.len() >= HEIGHT)
    }
}

/// One of the two fixed player slots.
#[derive(Debug, Clone)]
pub struct Seat {
    pub player_id: String,
    pub color: Color,
    pub rematch_vote: bool,
}

/// The two seats of a session. Colors are assigned by join order.
#[derive(Debug, Clone, Default)]
pub struct Seats {
    seats: Vec<Seat>,
}

impl Seats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a seat. Re-joining an existing player id is idempotent and
    /// returns the already-assigned color.
    pub fn join(&mut self, player_id: &str) -> Result<Color, RulesError> {
        if let Some(seat) = self.seats.iter().find(|s| s.player_id == player_id) {
            return Ok(seat.color);
        }
        if self.seats.len() >= 2 {
            return Err(RulesError::GameFull);
        }
        let color = self.seats.len() as Color;
        self.seats.push(Seat {
            player_id: player_id.to_string(),
            color,
            rematch_vote: false,
        });
        Ok(color)
    }

    pub fn leave(&mut self, player_id: &str) {
        self.seats.retain(|s| s.player_id != player_id);
    }

    pub fn color_of(&self, player_id: &str) -> Option<Color> {
        self.seats
            .iter()
            .find(|s| s.player_id == player_id)
            .map(|s| s.color)
    }

    /// Record a rematch vote. Returns true once both seats have voted in the
    /// same tick; the caller resets the board and the votes clear here.
    pub fn vote_rematch(&mut self, player_id: &str) -> Result<bool, RulesError> {
        let seat = self
            .seats
            .iter_mut()
            .find(|s| s.player_id == player_id)
            .ok_or_else(|| RulesError::UnknownPlayer(player_id.to_string()))?;
        seat.rematch_vote = true;

        let confirmed = self.seats.len() == 2 && self.seats.iter().all(|s| s.rematch_vote);
        if confirmed {
            for seat in &mut self.seats {
                seat.rematch_vote = false;
            }
        }
        Ok(confirmed)
    }

    pub fn players(&self) -> std::collections::HashMap<String, Color> {
        self.seats
            .iter()
            .map(|s| (s.player_id.clone(), s.color))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }
}

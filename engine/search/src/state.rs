//! Mutable search board with reversible make/unmake.
//!
//! A `SearchState` is a private, dense copy of one snapshot plus the
//! searching agent's color. Search mutates it in place and rewinds through
//! the move stack, so deep recursion allocates nothing per node.

use games_connectfour::wire::Snapshot;
use games_connectfour::{Color, HEIGHT, WIDTH};

/// Cell value: -1 empty, otherwise a `Color` (0 or 1).
pub const EMPTY: i8 = -1;

#[derive(Debug, Clone)]
pub struct SearchState {
    /// Column-major grid, `board[col][row]`, row 0 at the bottom.
    board: [[i8; HEIGHT]; WIDTH],
    heights: [usize; WIDTH],
    turn: i8,
    agent: i8,
    moves: Vec<usize>,
}

impl SearchState {
    /// Build a fresh search board from a snapshot, from the perspective of
    /// the seat `agent_color`.
    pub fn from_snapshot(snapshot: &Snapshot, agent_color: Color) -> Self {
        let mut board = [[EMPTY; HEIGHT]; WIDTH];
        let mut heights = [0usize; WIDTH];
        for (col, column) in snapshot.state.columns.iter().take(WIDTH).enumerate() {
            heights[col] = column.len().min(HEIGHT);
            for (row, &piece) in column.iter().take(HEIGHT).enumerate() {
                board[col][row] = piece as i8;
            }
        }
        Self {
            board,
            heights,
            turn: snapshot.state.current_turn as i8,
            agent: agent_color as i8,
            moves: Vec::with_capacity(WIDTH * HEIGHT),
        }
    }

    /// Color to move.
    pub fn turn(&self) -> i8 {
        self.turn
    }

    /// The searching agent's own color.
    pub fn agent(&self) -> i8 {
        self.agent
    }

    /// Number of moves made since this state was built (or last rewound).
    pub fn depth(&self) -> usize {
        self.moves.len()
    }

    /// Columns that can still take a piece, in natural order.
    pub fn legal_moves(&self) -> Vec<usize> {
        (0..WIDTH).filter(|&c| self.heights[c] < HEIGHT).collect()
    }

    pub fn is_full(&self) -> bool {
        self.heights.iter().all(|&h| h >= HEIGHT)
    }

    /// Drop the side-to-move's piece into `col` and flip the turn.
    pub fn make(&mut self, col: usize) {
        let row = self.heights[col];
        debug_assert!(row < HEIGHT, "make on full column {col}");
        self.board[col][row] = self.turn;
        self.heights[col] = row + 1;
        self.turn = 1 - self.turn;
        self.moves.push(col);
    }

    /// Undo the most recent `make`.
    pub fn unmake(&mut self) {
        let col = self.moves.pop().expect("unmake with empty move stack");
        let row = self.heights[col] - 1;
        self.board[col][row] = EMPTY;
        self.heights[col] = row;
        self.turn = 1 - self.turn;
    }

    /// Rewind to a previously recorded depth.
    pub fn rewind(&mut self, depth: usize) {
        while self.moves.len() > depth {
            self.unmake();
        }
    }

    /// The winning color, if the position holds a four-in-a-row line.
    ///
    /// With move history, only lines through the last-played cell are
    /// checked; a state fresh from a snapshot falls back to one full scan.
    pub fn winner(&self) -> Option<i8> {
        match self.moves.last() {
            Some(&col) => self.anchored_winner(col),
            None => self.full_scan_winner(),
        }
    }

    fn cell(&self, col: i32, row: i32) -> i8 {
        if col < 0 || col >= WIDTH as i32 || row < 0 || row >= HEIGHT as i32 {
            return EMPTY;
        }
        self.board[col as usize][row as usize]
    }

    fn anchored_winner(&self, col: usize) -> Option<i8> {
        let row = self.heights[col].checked_sub(1)?;
        let piece = self.board[col][row];
        if piece == EMPTY {
            return None;
        }
        const DIRECTIONS: [(i32, i32); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];
        for (dc, dr) in DIRECTIONS {
            let mut run = 1;
            for sign in [1i32, -1] {
                let (mut c, mut r) = (col as i32 + sign * dc, row as i32 + sign * dr);
                while self.cell(c, r) == piece {
                    run += 1;
                    c += sign * dc;
                    r += sign * dr;
                }
            }
            if run >= 4 {
                return Some(piece);
            }
        }
        None
    }

    fn full_scan_winner(&self) -> Option<i8> {
        const DIRECTIONS: [(i32, i32); 4] = [(1, 0), (0, 1), (1, 1), (-1, 1)];
        for (dc, dr) in DIRECTIONS {
            for col in 0..WIDTH {
                for row in 0..self.heights[col] {
                    let piece = self.board[col][row];
                    if piece == EMPTY {
                        continue;
                    }
                    let last_c = col as i32 + 3 * dc;
                    let last_r = row as i32 + 3 * dr;
                    if last_c < 0 || last_c >= WIDTH as i32 || last_r < 0 || last_r >= HEIGHT as i32
                    {
                        continue;
                    }
                    if (1..4).all(|i| self.cell(col as i32 + i * dc, row as i32 + i * dr) == piece)
                    {
                        return Some(piece);
                    }
                }
            }
        }
        None
    }

    /// Deterministic 42-byte key for this position: one digit per cell in
    /// column-major order, `0` empty and `1`/`2` for the colors. Indexes
    /// the persisted search statistics.
    pub fn canonical_key(&self) -> String {
        let mut bytes = Vec::with_capacity(WIDTH * HEIGHT);
        for col in 0..WIDTH {
            for row in 0..HEIGHT {
                bytes.push((self.board[col][row] + 1) as u8 + b'0');
            }
        }
        String::from_utf8(bytes).expect("cell digits are ascii")
    }
}

//! Single-writer game session.
//!
//! One task owns the `GameState` and the two seats. Every mutation (join,
//! leave, move, rematch vote) arrives through one ordered command channel,
//! so the rules engine never sees concurrent access; that channel is the
//! only synchronization in the whole session. After each accepted command a
//! fresh snapshot is fanned out to every joined player's outbound queue in
//! command order.

use std::collections::HashMap;

use games_connectfour::wire::{MovePayload, Snapshot};
use games_connectfour::{Color, GameState, RulesError, Seats};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Bound for the command stream and each player's outbound queue.
pub const QUEUE_DEPTH: usize = 16;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Rules(#[from] RulesError),

    #[error("game session is closed")]
    Closed,
}

/// What a joined player gets back: their color and their private snapshot
/// queue. Re-joining replaces the queue, which ends any previous consumer.
pub struct PlayerHandle {
    pub color: Color,
    pub updates: mpsc::Receiver<Vec<u8>>,
}

enum Command {
    Join {
        player_id: String,
        reply: oneshot::Sender<Result<PlayerHandle, RulesError>>,
    },
    Leave {
        player_id: String,
    },
    Move {
        player_id: String,
        payload: Vec<u8>,
    },
}

/// Cloneable front of the session's command stream.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
}

impl SessionHandle {
    pub async fn join(&self, player_id: &str) -> Result<PlayerHandle, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Join {
                player_id: player_id.to_string(),
                reply,
            })
            .await
            .map_err(|_| SessionError::Closed)?;
        response
            .await
            .map_err(|_| SessionError::Closed)?
            .map_err(SessionError::Rules)
    }

    /// Give up the seat explicitly. Dropping a connection does NOT do this.
    pub async fn leave(&self, player_id: &str) -> Result<(), SessionError> {
        self.commands
            .send(Command::Leave {
                player_id: player_id.to_string(),
            })
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Submit a raw move payload. Malformed input is discarded inside the
    /// session; this only fails when the session is gone.
    pub async fn submit(&self, player_id: &str, payload: Vec<u8>) -> Result<(), SessionError> {
        self.commands
            .send(Command::Move {
                player_id: player_id.to_string(),
                payload,
            })
            .await
            .map_err(|_| SessionError::Closed)
    }
}

/// Spawn the session task. The task ends when every handle is dropped.
pub fn spawn() -> SessionHandle {
    let (commands, inbox) = mpsc::channel(QUEUE_DEPTH);
    tokio::spawn(run(inbox));
    SessionHandle { commands }
}

async fn run(mut inbox: mpsc::Receiver<Command>) {
    let mut session = Session::new();
    while let Some(command) = inbox.recv().await {
        session.handle(command);
    }
    info!("game session closed");
}

struct Session {
    state: GameState,
    seats: Seats,
    outboxes: HashMap<String, mpsc::Sender<Vec<u8>>>,
}

impl Session {
    fn new() -> Self {
        Self {
            state: GameState::new(),
            seats: Seats::new(),
            outboxes: HashMap::new(),
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Join { player_id, reply } => {
                let _ = reply.send(self.join(&player_id));
            }
            Command::Leave { player_id } => {
                info!(player_id = %player_id, "player left the game");
                self.seats.leave(&player_id);
                self.outboxes.remove(&player_id);
                self.broadcast();
            }
            Command::Move { player_id, payload } => self.handle_move(&player_id, &payload),
        }
    }

    fn join(&mut self, player_id: &str) -> Result<PlayerHandle, RulesError> {
        let color = self.seats.join(player_id)?;
        let (updates_tx, updates) = mpsc::channel(QUEUE_DEPTH);
        self.outboxes.insert(player_id.to_string(), updates_tx);
        info!(player_id, color, "player joined");
        self.broadcast();
        Ok(PlayerHandle { color, updates })
    }

    fn handle_move(&mut self, player_id: &str, payload: &[u8]) {
        let Some(color) = self.seats.color_of(player_id) else {
            debug!(player_id, "discarding move from unknown player");
            return;
        };
        let payload = match MovePayload::from_bytes(payload) {
            Ok(p) => p,
            Err(e) => {
                debug!(player_id, error = %e, "discarding malformed move payload");
                return;
            }
        };
        if payload.is_noop() {
            debug!(player_id, "discarding empty move payload");
            return;
        }

        if payload.rematch {
            match self.seats.vote_rematch(player_id) {
                Ok(confirmed) => {
                    info!(player_id, confirmed, "rematch vote");
                    if confirmed {
                        self.state = GameState::new();
                    }
                    self.broadcast();
                }
                Err(e) => warn!(player_id, error = %e, "rematch vote rejected"),
            }
            return;
        }

        match self.state.apply_move(color, payload.col as usize) {
            Ok(()) => {
                debug!(player_id, col = payload.col, "move accepted");
                self.broadcast();
            }
            Err(e) => warn!(player_id, col = payload.col, error = %e, "move rejected"),
        }
    }

    /// Push the current snapshot to every joined player, in command order.
    /// A full queue drops that player's copy (snapshots are self-contained,
    /// the next delivered one supersedes the gap); the session never blocks
    /// on a slow reader.
    fn broadcast(&mut self) {
        let snapshot = Snapshot::new(self.state.clone(), self.seats.players());
        let bytes = match snapshot.to_bytes() {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "snapshot encoding failed");
                return;
            }
        };

        let mut gone = Vec::new();
        for (player_id, outbox) in &self.outboxes {
            match outbox.try_send(bytes.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(player_id, "outbound queue full, dropping snapshot");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => gone.push(player_id.clone()),
            }
        }
        for player_id in gone {
            // Connection is gone but the seat stays for a reconnect.
            debug!(player_id = %player_id, "removing closed outbound queue");
            self.outboxes.remove(&player_id);
        }
    }
}

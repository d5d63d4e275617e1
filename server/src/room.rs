//! Session multiplexer: binds WebSocket connections to the game session.
//!
//! Each connection runs an inbound loop (frames to session commands) and an
//! outbound loop (snapshot queue to frames), tied together by a close
//! signal: either side ending tears down the other and releases connection
//! resources only. The seat itself survives a disconnect so a player can
//! refresh or reconnect; leaving is an explicit command.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::session::{PlayerHandle, SessionHandle};

/// What to do when a player id opens a second simultaneous connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DuplicatePolicy {
    /// Refuse the new connection, keep the old one.
    Reject,
    /// Drop the old connection, the new one takes over.
    Replace,
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicatePolicy::Reject => write!(f, "reject"),
            DuplicatePolicy::Replace => write!(f, "replace"),
        }
    }
}

struct Connection {
    id: u64,
    close: watch::Sender<bool>,
}

/// One two-seat room bound to one game session.
pub struct GameRoom {
    session: SessionHandle,
    policy: DuplicatePolicy,
    connections: Mutex<HashMap<String, Connection>>,
    next_connection_id: AtomicU64,
}

#[derive(Deserialize)]
pub struct ConnectParams {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

/// `GET /game?userId=<id>`: upgrade to a WebSocket bound to that player.
pub async fn connect(
    State(room): State<Arc<GameRoom>>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(player_id) = params.user_id.filter(|id| !id.is_empty()) else {
        return (StatusCode::FORBIDDEN, "missing userId parameter").into_response();
    };
    ws.on_upgrade(move |socket| async move {
        room.run_connection(socket, player_id).await;
    })
}

impl GameRoom {
    pub fn new(session: SessionHandle, policy: DuplicatePolicy) -> Arc<Self> {
        Arc::new(Self {
            session,
            policy,
            connections: Mutex::new(HashMap::new()),
            next_connection_id: AtomicU64::new(0),
        })
    }

    /// Serve one player connection to completion.
    pub async fn run_connection(self: Arc<Self>, mut socket: WebSocket, player_id: String) {
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let (close_tx, close_rx) = watch::channel(false);

        let admitted = {
            let mut connections = self.connections.lock().expect("connections lock");
            let duplicate = connections.contains_key(&player_id);
            if duplicate && self.policy == DuplicatePolicy::Reject {
                false
            } else {
                if duplicate {
                    info!(player_id = %player_id, "replacing existing connection");
                    if let Some(previous) = connections.get(&player_id) {
                        let _ = previous.close.send(true);
                    }
                }
                connections.insert(
                    player_id.clone(),
                    Connection {
                        id: connection_id,
                        close: close_tx.clone(),
                    },
                );
                true
            }
        };
        if !admitted {
            warn!(player_id = %player_id, "duplicate connection rejected");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }

        let handle = match self.session.join(&player_id).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(player_id = %player_id, error = %e, "join refused");
                let _ = socket.send(Message::Close(None)).await;
                self.forget_connection(&player_id, connection_id);
                return;
            }
        };
        info!(player_id = %player_id, color = handle.color, "connection established");

        let (mut ws_tx, mut ws_rx) = socket.split();
        let PlayerHandle { mut updates, .. } = handle;

        // Outbound: snapshot queue -> socket. Signals close on exit so the
        // inbound loop never outlives it.
        let outbound_close = close_tx.clone();
        let mut outbound_close_rx = close_rx.clone();
        let outbound = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = outbound_close_rx.changed() => break,
                    update = updates.recv() => match update {
                        Some(bytes) => {
                            let text = match String::from_utf8(bytes) {
                                Ok(text) => text,
                                Err(e) => {
                                    warn!(error = %e, "snapshot was not utf-8");
                                    continue;
                                }
                            };
                            if ws_tx.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        // Queue replaced by a re-join, or session shut down.
                        None => break,
                    },
                }
            }
            let _ = outbound_close.send(true);
        });

        // Inbound: socket frames -> session commands. Text frames only.
        let mut inbound_close_rx = close_rx.clone();
        loop {
            tokio::select! {
                _ = inbound_close_rx.changed() => break,
                frame = ws_rx.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if self
                            .session
                            .submit(&player_id, text.into_bytes())
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(player_id = %player_id, error = %e, "socket read failed");
                        break;
                    }
                },
            }
        }

        let _ = close_tx.send(true);
        let _ = outbound.await;
        self.forget_connection(&player_id, connection_id);
        info!(player_id = %player_id, "connection closed");
    }

    /// Drop our connection-table entry, unless a replacement already owns it.
    fn forget_connection(&self, player_id: &str, connection_id: u64) {
        let mut connections = self.connections.lock().expect("connections lock");
        if connections
            .get(player_id)
            .is_some_and(|c| c.id == connection_id)
        {
            connections.remove(player_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session;
    use axum::routing::get;
    use axum::Router;
    use futures_util::{SinkExt, StreamExt};
    use games_connectfour::wire::{MovePayload, Snapshot};
    use games_connectfour::{BLACK, RED};
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn start_server(policy: DuplicatePolicy) -> String {
        let room = GameRoom::new(session::spawn(), policy);
        let app = Router::new().route("/game", get(connect)).with_state(room);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("ws://{addr}/game")
    }

    async fn connect_player(base: &str, player_id: &str) -> Client {
        let (client, _) = connect_async(format!("{base}?userId={player_id}"))
            .await
            .expect("websocket handshake");
        client
    }

    async fn next_snapshot(client: &mut Client) -> Snapshot {
        loop {
            let message = timeout(Duration::from_secs(5), client.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("stream ended")
                .expect("frame error");
            if let WsMessage::Text(text) = message {
                return Snapshot::from_bytes(text.as_bytes()).expect("snapshot decodes");
            }
        }
    }

    async fn send_move(client: &mut Client, payload: MovePayload) {
        let text = String::from_utf8(payload.to_bytes().unwrap()).unwrap();
        client.send(WsMessage::Text(text)).await.unwrap();
    }

    /// The stream ends (close frame or EOF) within the timeout.
    async fn assert_closed(client: &mut Client) {
        loop {
            match timeout(Duration::from_secs(5), client.next())
                .await
                .expect("timed out waiting for close")
            {
                Some(Ok(WsMessage::Close(_))) | None => return,
                Some(Ok(_)) => continue,
                Some(Err(_)) => return,
            }
        }
    }

    #[tokio::test]
    async fn missing_user_id_is_refused() {
        let base = start_server(DuplicatePolicy::Replace).await;
        assert!(connect_async(&base).await.is_err());
    }

    #[tokio::test]
    async fn two_players_see_each_others_moves() {
        let base = start_server(DuplicatePolicy::Replace).await;

        let mut alice = connect_player(&base, "alice").await;
        let snapshot = next_snapshot(&mut alice).await;
        assert_eq!(snapshot.players.get("alice"), Some(&RED));

        let mut bob = connect_player(&base, "bob").await;
        let snapshot = next_snapshot(&mut bob).await;
        assert_eq!(snapshot.players.get("bob"), Some(&BLACK));
        // Alice also sees bob's join.
        let snapshot = next_snapshot(&mut alice).await;
        assert_eq!(snapshot.players.len(), 2);

        send_move(&mut alice, MovePayload::drop(3)).await;
        for client in [&mut alice, &mut bob] {
            let snapshot = next_snapshot(client).await;
            assert_eq!(snapshot.state.columns[3], vec![RED]);
            assert_eq!(snapshot.state.current_turn, BLACK);
        }
    }

    #[tokio::test]
    async fn third_player_is_turned_away() {
        let base = start_server(DuplicatePolicy::Replace).await;
        let _alice = connect_player(&base, "alice").await;
        let _bob = connect_player(&base, "bob").await;

        let mut carol = connect_player(&base, "carol").await;
        assert_closed(&mut carol).await;
    }

    #[tokio::test]
    async fn reject_policy_keeps_the_first_connection() {
        let base = start_server(DuplicatePolicy::Reject).await;

        let mut first = connect_player(&base, "alice").await;
        next_snapshot(&mut first).await;

        let mut second = connect_player(&base, "alice").await;
        assert_closed(&mut second).await;

        // The original connection still works.
        send_move(&mut first, MovePayload::drop(0)).await;
        let snapshot = next_snapshot(&mut first).await;
        assert_eq!(snapshot.state.columns[0], vec![RED]);
    }

    #[tokio::test]
    async fn replace_policy_hands_over_to_the_new_connection() {
        let base = start_server(DuplicatePolicy::Replace).await;

        let mut first = connect_player(&base, "alice").await;
        next_snapshot(&mut first).await;

        let mut second = connect_player(&base, "alice").await;
        let snapshot = next_snapshot(&mut second).await;
        assert_eq!(snapshot.players.get("alice"), Some(&RED));

        assert_closed(&mut first).await;

        send_move(&mut second, MovePayload::drop(6)).await;
        let snapshot = next_snapshot(&mut second).await;
        assert_eq!(snapshot.state.columns[6], vec![RED]);
    }

    #[tokio::test]
    async fn disconnect_keeps_the_seat_for_a_reconnect() {
        let base = start_server(DuplicatePolicy::Replace).await;

        let mut alice = connect_player(&base, "alice").await;
        next_snapshot(&mut alice).await;
        let mut bob = connect_player(&base, "bob").await;
        next_snapshot(&mut bob).await;

        send_move(&mut alice, MovePayload::drop(2)).await;
        next_snapshot(&mut alice).await;

        // Alice drops the connection entirely.
        alice.close(None).await.unwrap();
        drop(alice);

        // ... and comes back: same color, board intact, no GameFull.
        let mut again = connect_player(&base, "alice").await;
        let snapshot = next_snapshot(&mut again).await;
        assert_eq!(snapshot.players.get("alice"), Some(&RED));
        assert_eq!(snapshot.state.columns[2], vec![RED]);
    }

    #[tokio::test]
    async fn malformed_frames_do_not_kill_the_connection() {
        let base = start_server(DuplicatePolicy::Replace).await;

        let mut alice = connect_player(&base, "alice").await;
        next_snapshot(&mut alice).await;

        alice
            .send(WsMessage::Text("definitely not json".into()))
            .await
            .unwrap();
        send_move(&mut alice, MovePayload::drop(1)).await;
        let snapshot = next_snapshot(&mut alice).await;
        assert_eq!(snapshot.state.columns[1], vec![RED]);
    }
}

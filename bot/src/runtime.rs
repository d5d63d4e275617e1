//! Drives one agent against a live game connection.
//!
//! The inbound loop feeds each snapshot frame to the agent's state and,
//! when the agent can act, queues the generated action; the outbound loop
//! drains that queue to the socket. Losing either direction ends both and
//! the runtime returns. There is no retry: after a rejected move the agent
//! simply acts again on the next snapshot.

use agent_core::{Action, Agent, State};
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

const ACTION_QUEUE_DEPTH: usize = 8;

pub struct AgentRuntime<A: Agent> {
    agent: A,
}

impl<A: Agent> AgentRuntime<A> {
    pub fn new(agent: A) -> Self {
        Self { agent }
    }

    /// Connect to `url` and play until the connection drops.
    pub async fn run(mut self, url: &str) -> Result<()> {
        let (socket, _) = connect_async(url)
            .await
            .with_context(|| format!("failed to connect to {url}"))?;
        info!(url, "connected");
        let (mut sink, mut stream) = socket.split();

        let (actions_tx, mut actions_rx) = mpsc::channel::<Vec<u8>>(ACTION_QUEUE_DEPTH);
        let writer = tokio::spawn(async move {
            while let Some(payload) = actions_rx.recv().await {
                let text = match String::from_utf8(payload) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "action payload was not utf-8");
                        continue;
                    }
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    // Can't write, the connection is gone.
                    break;
                }
            }
        });

        let mut state = self.agent.base_state();
        while let Some(frame) = stream.next().await {
            let message = match frame {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "socket read failed");
                    break;
                }
            };
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => {
                    info!("server closed the connection");
                    break;
                }
                _ => continue,
            };

            if let Err(e) = state.apply_update(text.as_bytes()) {
                warn!(error = %e, "discarding malformed snapshot");
                continue;
            }
            if !self.agent.can_act(&state) {
                debug!("nothing to do for this snapshot");
                continue;
            }

            let action = self.agent.generate_action(&state);
            let payload = match action.to_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "failed to encode action");
                    continue;
                }
            };
            if actions_tx.send(payload).await.is_err() {
                break;
            }
        }

        // Closing the queue ends the writer; join it before returning.
        drop(actions_tx);
        let _ = writer.await;
        info!("agent runtime stopped");
        Ok(())
    }
}

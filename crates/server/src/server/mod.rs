//! Game server implementation.
//!
//! The gateway is the only part of the server touching transport: it accepts
//! WebSocket connections, decodes inbound intent frames, forwards them into
//! the game state, and delivers outbound events and snapshots verbatim.

use crate::config::Config;
use futures_util::{SinkExt, StreamExt};
use protocol::ServerMessage;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};

pub mod game;
pub mod session;

pub use game::{run_broadcast_loop, run_game_loop, GameState};

/// A world event pushed to every session the moment it happens.
#[derive(Debug, Clone)]
pub struct EventBroadcast {
    /// Session to skip (the originator already got its own reply).
    pub except: Option<u32>,
    /// The event payload.
    pub message: ServerMessage,
}

/// A periodic state snapshot, serialized once and fanned out to everyone.
#[derive(Debug, Clone)]
pub struct StateBroadcast {
    pub json: String,
}

/// A message targeted at a specific session.
#[derive(Debug, Clone)]
pub struct TargetedMessage {
    /// Target session ID.
    pub session_id: u32,
    /// The message payload.
    pub message: ServerMessage,
}

/// Connection tracking state (shared across connection handlers).
struct ConnectionState {
    /// Number of connections per IP address.
    ip_connections: HashMap<IpAddr, usize>,
    /// Total number of connections.
    total_connections: usize,
}

impl ConnectionState {
    fn new() -> Self {
        Self {
            ip_connections: HashMap::new(),
            total_connections: 0,
        }
    }

    /// Try to add a connection, returns true if allowed.
    fn try_add_connection(&mut self, ip: IpAddr, max_total: usize, max_per_ip: usize) -> bool {
        if self.total_connections >= max_total {
            return false;
        }

        let current = self.ip_connections.get(&ip).copied().unwrap_or(0);
        if current >= max_per_ip {
            return false;
        }

        *self.ip_connections.entry(ip).or_insert(0) += 1;
        self.total_connections += 1;
        true
    }

    /// Remove a connection.
    fn remove_connection(&mut self, ip: IpAddr) {
        if let Some(count) = self.ip_connections.get_mut(&ip) {
            if *count > 0 {
                *count -= 1;
                self.total_connections = self.total_connections.saturating_sub(1);
            }
            if *count == 0 {
                self.ip_connections.remove(&ip);
            }
        }
    }
}

/// Run the game server.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on ws://{}", addr);

    // Connection tracking state
    let conn_state = Arc::new(RwLock::new(ConnectionState::new()));

    // Broadcast channels for events, state snapshots, and targeted messages
    let (event_tx, _event_rx) = broadcast::channel::<EventBroadcast>(256);
    let (state_tx, _state_rx) = broadcast::channel::<StateBroadcast>(8);
    let (targeted_tx, _targeted_rx) = broadcast::channel::<TargetedMessage>(256);

    // Shared game state
    let game_state = Arc::new(RwLock::new(GameState::new(
        &config,
        event_tx.clone(),
        targeted_tx.clone(),
    )));

    // Start the simulation loop
    let sim_state = Arc::clone(&game_state);
    let tick_interval = config.server.tick_interval_ms;
    tokio::spawn(async move {
        game::run_game_loop(sim_state, tick_interval).await;
    });

    // Start the snapshot publisher on its own timer
    let publish_state = Arc::clone(&game_state);
    let publish_tx = state_tx.clone();
    let broadcast_interval = config.server.broadcast_interval_ms;
    tokio::spawn(async move {
        game::run_broadcast_loop(publish_state, publish_tx, broadcast_interval).await;
    });

    // Connection limits
    let max_connections = config.server.max_connections;
    let ip_limit = config.server.ip_limit;

    loop {
        let (stream, addr) = listener.accept().await?;
        let ip = addr.ip();

        {
            let mut state = conn_state.write().await;
            if !state.try_add_connection(ip, max_connections, ip_limit) {
                warn!("Connection rejected (limit reached): {}", addr);
                continue;
            }
        }

        let game_state = Arc::clone(&game_state);
        let conn_state = Arc::clone(&conn_state);
        let event_rx = event_tx.subscribe();
        let state_rx = state_tx.subscribe();
        let targeted_rx = targeted_tx.subscribe();

        tokio::spawn(async move {
            let result =
                handle_connection(stream, addr, game_state, event_rx, state_rx, targeted_rx).await;

            // Always remove from connection tracking when done
            {
                let mut state = conn_state.write().await;
                state.remove_connection(addr.ip());
            }

            if let Err(e) = result {
                error!("Connection error from {}: {}", addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    game_state: Arc<RwLock<GameState>>,
    mut event_rx: broadcast::Receiver<EventBroadcast>,
    mut state_rx: broadcast::Receiver<StateBroadcast>,
    mut targeted_rx: broadcast::Receiver<TargetedMessage>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New connection from {}", addr);

    let (mut write, mut read) = ws_stream.split();

    // Register the session
    let session_id = {
        let mut state = game_state.write().await;
        state.add_session(addr)
    };

    // Message loop - handle both incoming frames and broadcasts
    loop {
        tokio::select! {
            // Handle incoming WebSocket messages
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let mut state = game_state.write().await;
                        if let Err(e) = state.handle_message(session_id, text.as_str()) {
                            warn!("Message error from {}: {}", addr, e);
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} disconnected", addr);
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", addr, e);
                        break;
                    }
                    None => {
                        break;
                    }
                    _ => {}
                }
            }
            // Handle immediate event broadcasts
            event = event_rx.recv() => {
                if let Ok(event) = event {
                    if event.except == Some(session_id) {
                        continue;
                    }
                    match event.message.to_json() {
                        Ok(json) => {
                            if let Err(e) = write.send(Message::Text(json.into())).await {
                                warn!("Failed to send event to {}: {}", addr, e);
                                break;
                            }
                        }
                        Err(e) => {
                            error!("Failed to encode event for {}: {}", addr, e);
                        }
                    }
                }
            }
            // Handle periodic state snapshots (pre-serialized)
            snapshot = state_rx.recv() => {
                if let Ok(snapshot) = snapshot {
                    if let Err(e) = write.send(Message::Text(snapshot.json.into())).await {
                        warn!("Failed to send snapshot to {}: {}", addr, e);
                        break;
                    }
                }
            }
            // Handle targeted messages (init, orb resync)
            targeted = targeted_rx.recv() => {
                if let Ok(msg) = targeted {
                    if msg.session_id != session_id {
                        continue;
                    }
                    match msg.message.to_json() {
                        Ok(json) => {
                            if let Err(e) = write.send(Message::Text(json.into())).await {
                                warn!("Failed to send message to {}: {}", addr, e);
                                break;
                            }
                        }
                        Err(e) => {
                            error!("Failed to encode message for {}: {}", addr, e);
                        }
                    }
                }
            }
        }
    }

    // Remove the session (and its serpent) atomically with the next tick
    {
        let mut state = game_state.write().await;
        state.remove_session(session_id);
    }

    Ok(())
}

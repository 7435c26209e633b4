//! Game state and the two periodic loops.
//!
//! `GameState` owns the session registry and the world aggregate. All
//! mutation is serialized behind one `RwLock`: intent handlers and the
//! simulation tick take the write lock, the broadcast loop takes the read
//! lock and therefore always observes a fully completed tick.

use crate::config::Config;
use crate::entity::Serpent;
use crate::simulation::{self, TickEvent};
use crate::world::World;
use protocol::{
    ClientMessage, Color, OrbState, ParticleState, PlayerSnapshot, PlayerState, Point,
    ServerMessage,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use super::session::Session;
use super::{EventBroadcast, StateBroadcast, TargetedMessage};

/// Body color used when a joining client does not pick one.
const DEFAULT_COLOR: Color = Color::new(0x39, 0xff, 0xe1);

/// Main game state.
pub struct GameState {
    pub config: Config,
    pub tick_count: u64,

    // Connected sessions
    pub sessions: HashMap<u32, Session>,
    next_session_id: u32,

    // Game world (serpents + orbs)
    pub world: World,

    // Immediate event broadcast channel
    event_tx: broadcast::Sender<EventBroadcast>,

    // Targeted message channel (init, orb resync)
    targeted_tx: broadcast::Sender<TargetedMessage>,

    // Average tick duration in milliseconds (exponential moving average).
    pub update_time_avg: f64,
}

impl GameState {
    /// Create a new game state.
    pub fn new(
        config: &Config,
        event_tx: broadcast::Sender<EventBroadcast>,
        targeted_tx: broadcast::Sender<TargetedMessage>,
    ) -> Self {
        Self {
            config: config.clone(),
            tick_count: 0,
            sessions: HashMap::new(),
            next_session_id: 1,
            world: World::new(config),
            event_tx,
            targeted_tx,
            update_time_avg: 0.0,
        }
    }

    /// Add a new session.
    pub fn add_session(&mut self, addr: SocketAddr) -> u32 {
        let id = self.next_session_id;
        self.next_session_id += 1;
        self.sessions.insert(id, Session::new(id, addr));
        info!("Session {} connected from {}", id, addr);
        id
    }

    /// Remove a session and its serpent, announcing the departure.
    pub fn remove_session(&mut self, id: u32) {
        if let Some(session) = self.sessions.remove(&id) {
            info!("Session {} ({}) disconnected", session.id, session.addr);
            if self.world.remove_serpent(id).is_some() {
                self.broadcast(None, ServerMessage::Left { id });
            }
        }
    }

    /// Handle a text frame from a session.
    pub fn handle_message(&mut self, id: u32, text: &str) -> anyhow::Result<()> {
        if !self.sessions.contains_key(&id) {
            // Late frame from a connection that is already torn down.
            return Ok(());
        }

        match ClientMessage::parse(text)? {
            ClientMessage::Join { name, color } => self.handle_join(id, name, color),
            ClientMessage::Move { target, boost } => self.handle_move(id, target, boost),
            ClientMessage::Restart => self.handle_restart(id),
            ClientMessage::RequestOrbs => self.handle_request_orbs(id),
        }

        Ok(())
    }

    /// Handle a join request: spawn, reply with the world, announce.
    fn handle_join(&mut self, id: u32, name: String, color: Option<Color>) {
        let name: String = name
            .chars()
            .take(self.config.serpent.max_name_length)
            .collect();
        let color = color.unwrap_or(DEFAULT_COLOR);

        self.world.spawn_serpent(id, name.clone(), color, &self.config);
        info!(
            "Session {} joined as '{}'",
            id,
            if name.is_empty() { "An unnamed serpent" } else { &name }
        );

        // The joiner gets the whole current world.
        self.send_to(
            id,
            ServerMessage::Init {
                id,
                field_size: self.config.arena.size,
                orbs: self.orb_states(),
                players: self.world.serpents.values().map(full_projection).collect(),
            },
        );

        // Everyone else just learns about the newcomer.
        if let Some(serpent) = self.world.serpents.get(&id) {
            self.broadcast(
                Some(id),
                ServerMessage::Joined {
                    player: full_projection(serpent),
                },
            );
        }
    }

    /// Apply a movement intent. Absent fields leave state untouched;
    /// unknown or dead serpents make this a no-op.
    fn handle_move(&mut self, id: u32, target: Option<Point>, boost: Option<bool>) {
        let Some(serpent) = self.world.serpents.get_mut(&id) else {
            return;
        };
        if !serpent.alive {
            return;
        }

        if let Some(target) = target {
            let to = glam::Vec2::from(target) - serpent.head();
            // A target on top of the head has no direction; keep the old one.
            if to.length_squared() > f32::EPSILON {
                serpent.desired_heading = to.y.atan2(to.x);
            }
        }
        if let Some(boost) = boost {
            serpent.boosting = boost;
        }
    }

    /// Respawn a serpent in place and announce the new body.
    fn handle_restart(&mut self, id: u32) {
        if !self.world.respawn_serpent(id, &self.config) {
            return;
        }
        if let Some(serpent) = self.world.serpents.get(&id) {
            info!("Session {} restarted", id);
            self.broadcast(
                None,
                ServerMessage::Restarted {
                    id,
                    segments: segment_points(serpent, usize::MAX),
                },
            );
        }
    }

    /// On-demand orb resync for one session.
    fn handle_request_orbs(&mut self, id: u32) {
        self.send_to(
            id,
            ServerMessage::Orbs {
                orbs: self.orb_states(),
            },
        );
    }

    /// Run one simulation tick and announce whatever it produced.
    pub fn tick(&mut self) {
        self.tick_count += 1;
        for event in simulation::tick(&mut self.world, &self.config) {
            match event {
                TickEvent::OrbEaten { serpent_id, orb_id } => {
                    self.broadcast(
                        None,
                        ServerMessage::Eaten {
                            player_id: serpent_id,
                            orb_id,
                        },
                    );
                }
                TickEvent::Died {
                    serpent_id,
                    score,
                    reason,
                } => {
                    info!("Serpent {} died ({:?}) with score {}", serpent_id, reason, score);
                    self.broadcast(
                        None,
                        ServerMessage::Dead {
                            id: serpent_id,
                            score,
                            reason,
                        },
                    );
                }
            }
        }
    }

    /// Build the periodic snapshot of the post-tick world.
    pub fn snapshot(&self) -> ServerMessage {
        let caps = &self.config.broadcast;
        let players = self
            .world
            .serpents
            .iter()
            .map(|(&id, serpent)| {
                (
                    id,
                    PlayerSnapshot {
                        name: serpent.name.clone(),
                        color: serpent.color,
                        score: serpent.score,
                        alive: serpent.alive,
                        boosting: serpent.boosting,
                        boost_reserve: serpent.boost_reserve,
                        segments: segment_points(serpent, caps.segment_cap),
                        particles: serpent
                            .particles
                            .iter()
                            .take(caps.particle_cap)
                            .map(|p| ParticleState {
                                x: p.position.x,
                                y: p.position.y,
                                life: p.life,
                            })
                            .collect(),
                    },
                )
            })
            .collect();

        ServerMessage::State {
            timestamp: simulation::now_ms(),
            players,
            orbs: self.orb_states(),
            leaderboard: self.world.leaderboard(caps.leaderboard_size),
        }
    }

    fn orb_states(&self) -> Vec<OrbState> {
        self.world
            .orbs
            .iter()
            .map(|orb| OrbState {
                id: orb.id,
                x: orb.position.x,
                y: orb.position.y,
                color: orb.color,
                pop: orb.pop,
            })
            .collect()
    }

    /// Fire-and-forget an event to every session (minus `except`).
    fn broadcast(&self, except: Option<u32>, message: ServerMessage) {
        let _ = self.event_tx.send(EventBroadcast { except, message });
    }

    /// Fire-and-forget a message to one session.
    fn send_to(&self, session_id: u32, message: ServerMessage) {
        let _ = self.targeted_tx.send(TargetedMessage {
            session_id,
            message,
        });
    }
}

/// Full projection of a serpent for init/joined payloads.
fn full_projection(serpent: &Serpent) -> PlayerState {
    PlayerState {
        id: serpent.id,
        name: serpent.name.clone(),
        color: serpent.color,
        segments: segment_points(serpent, usize::MAX),
        score: serpent.score,
        alive: serpent.alive,
        boosting: serpent.boosting,
    }
}

fn segment_points(serpent: &Serpent, cap: usize) -> Vec<Point> {
    serpent.segments.iter().take(cap).map(|&v| v.into()).collect()
}

/// Run the simulation loop at a fixed tick rate.
pub async fn run_game_loop(state: Arc<RwLock<GameState>>, tick_interval_ms: u64) {
    let start = Instant::now() + Duration::from_millis(tick_interval_ms);
    let mut ticker = interval_at(start, Duration::from_millis(tick_interval_ms));
    // Use Skip to catch up on missed ticks - ensures consistent game speed.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        // Hibernate when no sessions are connected to reduce CPU usage
        {
            let game = state.read().await;
            if game.sessions.is_empty() {
                drop(game);
                sleep(Duration::from_millis((tick_interval_ms * 4).max(100))).await;
                continue;
            }
        }

        let mut game = state.write().await;
        let tick_start = std::time::Instant::now();
        game.tick();
        let tick_ms = tick_start.elapsed().as_secs_f64() * 1000.0;

        // Exponential moving average (weight 0.5)
        game.update_time_avg = game.update_time_avg * 0.5 + tick_ms * 0.5;

        let tick_budget = tick_interval_ms as f64 * 0.9;
        if tick_ms > tick_budget {
            warn!(
                "Slow tick #{}: {:.3}ms (budget: {:.1}ms) - {} serpents, {} orbs",
                game.tick_count,
                tick_ms,
                tick_budget,
                game.world.serpents.len(),
                game.world.orbs.len()
            );
        }
    }
}

/// Run the state broadcast loop on its own fixed timer.
///
/// Snapshots are built under the read lock, so they always observe a fully
/// completed simulation tick, never an in-progress one. Each snapshot is
/// serialized once and fanned out to every connection.
pub async fn run_broadcast_loop(
    state: Arc<RwLock<GameState>>,
    state_tx: broadcast::Sender<StateBroadcast>,
    interval_ms: u64,
) {
    let start = Instant::now() + Duration::from_millis(interval_ms);
    let mut ticker = interval_at(start, Duration::from_millis(interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let json = {
            let game = state.read().await;
            if game.sessions.is_empty() {
                None
            } else {
                match game.snapshot().to_json() {
                    Ok(json) => Some(json),
                    Err(e) => {
                        error!("Failed to encode state snapshot: {}", e);
                        None
                    }
                }
            }
        };

        let Some(json) = json else { continue };
        let _ = state_tx.send(StateBroadcast { json });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> (
        GameState,
        broadcast::Receiver<EventBroadcast>,
        broadcast::Receiver<TargetedMessage>,
    ) {
        let (event_tx, event_rx) = broadcast::channel(64);
        let (targeted_tx, targeted_rx) = broadcast::channel(64);
        let config = Config::default();
        (GameState::new(&config, event_tx, targeted_tx), event_rx, targeted_rx)
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:9999".parse().unwrap()
    }

    #[test]
    fn test_join_truncates_name_and_sends_init() {
        let (mut game, mut event_rx, mut targeted_rx) = test_state();
        let id = game.add_session(addr());

        game.handle_message(
            id,
            r#"{"type":"join","name":"AlphaBetaGammaDeltaEpsilon"}"#,
        )
        .expect("join should succeed");

        let serpent = &game.world.serpents[&id];
        assert_eq!(serpent.name.chars().count(), 16);

        // The joiner got an init with the whole world.
        let targeted = targeted_rx.try_recv().expect("init should be queued");
        assert_eq!(targeted.session_id, id);
        match targeted.message {
            ServerMessage::Init {
                id: init_id,
                field_size,
                orbs,
                players,
            } => {
                assert_eq!(init_id, id);
                assert_eq!(field_size, game.config.arena.size);
                assert_eq!(orbs.len(), game.config.orb.count);
                assert_eq!(players.len(), 1);
                let player = &players[0];
                assert_eq!(player.segments.len(), game.config.serpent.base_segments);
                assert_eq!(player.score, 0);
                assert!(player.alive);
                assert!(!player.boosting);
            }
            other => panic!("expected init, got {other:?}"),
        }

        // Everyone else (not the joiner) gets a joined event.
        let event = event_rx.try_recv().expect("joined should be queued");
        assert_eq!(event.except, Some(id));
        assert!(matches!(event.message, ServerMessage::Joined { .. }));
    }

    #[test]
    fn test_move_updates_intent_only() {
        let (mut game, _event_rx, _targeted_rx) = test_state();
        let id = game.add_session(addr());
        game.handle_message(id, r#"{"type":"join","name":"Al"}"#).unwrap();

        let (head, old_heading, old_score) = {
            let s = &game.world.serpents[&id];
            (s.position, s.heading, s.score)
        };

        let target_x = head.x + 100.0;
        game.handle_message(
            id,
            &format!(r#"{{"type":"move","target":{{"x":{target_x},"y":{}}},"boost":true}}"#, head.y),
        )
        .unwrap();

        let s = &game.world.serpents[&id];
        assert!((s.desired_heading - 0.0).abs() < 1e-5, "target due east is heading 0");
        assert!(s.boosting);
        // Intents never move the body or touch the score.
        assert_eq!(s.position, head);
        assert_eq!(s.heading, old_heading);
        assert_eq!(s.score, old_score);

        // Omitted fields leave state unchanged.
        game.handle_message(id, r#"{"type":"move"}"#).unwrap();
        let s = &game.world.serpents[&id];
        assert!((s.desired_heading - 0.0).abs() < 1e-5);
        assert!(s.boosting);
    }

    #[test]
    fn test_intents_on_unknown_or_dead_serpents_are_noops() {
        let (mut game, _event_rx, _targeted_rx) = test_state();
        let id = game.add_session(addr());

        // Move before join: tolerated, nothing happens.
        game.handle_message(id, r#"{"type":"move","boost":true}"#).unwrap();
        assert!(game.world.serpents.is_empty());

        // Restart before join: same.
        game.handle_message(id, r#"{"type":"restart"}"#).unwrap();
        assert!(game.world.serpents.is_empty());

        game.handle_message(id, r#"{"type":"join","name":"Al"}"#).unwrap();
        game.world.serpents.get_mut(&id).unwrap().alive = false;
        game.handle_message(id, r#"{"type":"move","boost":true}"#).unwrap();
        assert!(!game.world.serpents[&id].boosting);
    }

    #[test]
    fn test_malformed_frames_do_not_corrupt_state() {
        let (mut game, _event_rx, _targeted_rx) = test_state();
        let id = game.add_session(addr());
        game.handle_message(id, r#"{"type":"join","name":"Al"}"#).unwrap();

        assert!(game.handle_message(id, "not json at all").is_err());
        assert!(game.handle_message(id, r#"{"type":"warp","x":1}"#).is_err());

        assert_eq!(game.sessions.len(), 1);
        assert!(game.world.serpents[&id].alive);
    }

    #[test]
    fn test_restart_broadcasts_new_body_to_all() {
        let (mut game, mut event_rx, _targeted_rx) = test_state();
        let id = game.add_session(addr());
        game.handle_message(id, r#"{"type":"join","name":"Al"}"#).unwrap();
        let _ = event_rx.try_recv(); // drop the joined event

        game.world.serpents.get_mut(&id).unwrap().alive = false;
        game.handle_message(id, r#"{"type":"restart"}"#).unwrap();

        let event = event_rx.try_recv().expect("restart should be announced");
        assert_eq!(event.except, None);
        match event.message {
            ServerMessage::Restarted { id: rid, segments } => {
                assert_eq!(rid, id);
                assert_eq!(segments.len(), game.config.serpent.base_segments);
            }
            other => panic!("expected restarted, got {other:?}"),
        }
        assert!(game.world.serpents[&id].alive);
    }

    #[test]
    fn test_disconnect_removes_and_announces() {
        let (mut game, mut event_rx, _targeted_rx) = test_state();
        let id = game.add_session(addr());
        game.handle_message(id, r#"{"type":"join","name":"Al"}"#).unwrap();
        let _ = event_rx.try_recv();

        game.remove_session(id);
        assert!(game.sessions.is_empty());
        assert!(game.world.serpents.is_empty());

        let event = event_rx.try_recv().expect("left should be announced");
        assert!(matches!(event.message, ServerMessage::Left { id: lid } if lid == id));

        // A session that never joined leaves silently.
        let id2 = game.add_session(addr());
        game.remove_session(id2);
        assert!(event_rx.try_recv().is_err());
    }

    #[test]
    fn test_request_orbs_goes_to_requester_only() {
        let (mut game, _event_rx, mut targeted_rx) = test_state();
        let id = game.add_session(addr());
        game.handle_message(id, r#"{"type":"join","name":"Al"}"#).unwrap();
        let _ = targeted_rx.try_recv(); // drop the init

        game.handle_message(id, r#"{"type":"request_orbs"}"#).unwrap();
        let targeted = targeted_rx.try_recv().expect("orbs should be queued");
        assert_eq!(targeted.session_id, id);
        match targeted.message {
            ServerMessage::Orbs { orbs } => assert_eq!(orbs.len(), game.config.orb.count),
            other => panic!("expected orbs, got {other:?}"),
        }
    }

    #[test]
    fn test_snapshot_truncates_and_ranks() {
        let (mut game, _event_rx, _targeted_rx) = test_state();
        let a = game.add_session(addr());
        let b = game.add_session(addr());
        game.handle_message(a, r#"{"type":"join","name":"A"}"#).unwrap();
        game.handle_message(b, r#"{"type":"join","name":"B"}"#).unwrap();

        // Keep the two bodies far apart so the tick below cannot kill anyone.
        for (id, corner) in [(a, 500.0_f32), (b, 2500.0_f32)] {
            let s = game.world.serpents.get_mut(&id).unwrap();
            s.position = glam::Vec2::new(corner, corner);
            s.heading = 0.0;
            s.desired_heading = 0.0;
            for (i, seg) in s.segments.iter_mut().enumerate() {
                *seg = glam::Vec2::new(corner - i as f32 * 8.0, corner);
            }
        }
        {
            let s = game.world.serpents.get_mut(&a).unwrap();
            s.score = 5;
            // Far more body than the snapshot cap.
            s.target_length = 2000.0 * game.config.serpent.spacing;
        }
        game.tick();

        match game.snapshot() {
            ServerMessage::State {
                players,
                orbs,
                leaderboard,
                ..
            } => {
                assert_eq!(players.len(), 2);
                assert_eq!(orbs.len(), game.config.orb.count);
                assert!(players[&a].segments.len() <= game.config.broadcast.segment_cap);
                assert_eq!(leaderboard[0].id, a);
            }
            other => panic!("expected state, got {other:?}"),
        }
    }
}

//! Server -> client messages: immediate events and the periodic snapshot.

use crate::{Color, Point, ProtocolError};
use serde::Serialize;
use std::collections::HashMap;

/// Why a serpent died.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeathReason {
    /// Head ran into another serpent's body.
    Hit,
    /// Head crossed the arena border (kill-on-wall policy only).
    Border,
}

/// One orb as seen by clients.
#[derive(Debug, Clone, Serialize)]
pub struct OrbState {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub color: Color,
    /// Spawn pop-in animation value, decaying from 1.1 to 0.
    pub pop: f32,
}

/// Full projection of a serpent, used for init/joined/restarted payloads.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerState {
    pub id: u32,
    pub name: String,
    pub color: Color,
    /// Body segments, head first.
    pub segments: Vec<Point>,
    pub score: u32,
    pub alive: bool,
    pub boosting: bool,
}

/// Truncated per-tick projection of a serpent.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub name: String,
    pub color: Color,
    pub score: u32,
    pub alive: bool,
    pub boosting: bool,
    pub boost_reserve: f32,
    /// At most the first `segment_cap` segments, head first.
    pub segments: Vec<Point>,
    /// At most the first `particle_cap` trail particles.
    pub particles: Vec<ParticleState>,
}

/// One boost-trail particle.
#[derive(Debug, Clone, Serialize)]
pub struct ParticleState {
    pub x: f32,
    pub y: f32,
    pub life: f32,
}

/// One leaderboard row.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub id: u32,
    pub name: String,
    pub score: u32,
}

/// A message from the server.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once to a session that just joined.
    Init {
        id: u32,
        field_size: f32,
        orbs: Vec<OrbState>,
        players: Vec<PlayerState>,
    },
    /// A new serpent entered the arena (sent to every other session).
    Joined { player: PlayerState },
    /// A serpent respawned with a fresh body.
    Restarted { id: u32, segments: Vec<Point> },
    /// A session disconnected and its serpent was removed.
    Left { id: u32 },
    /// An orb was consumed and replaced.
    Eaten { player_id: u32, orb_id: u64 },
    /// A serpent died.
    Dead {
        id: u32,
        score: u32,
        reason: DeathReason,
    },
    /// On-demand orb resync (sent to the requesting session only).
    Orbs { orbs: Vec<OrbState> },
    /// The periodic world snapshot.
    State {
        timestamp: u64,
        players: HashMap<u32, PlayerSnapshot>,
        orbs: Vec<OrbState>,
        leaderboard: Vec<LeaderboardEntry>,
    },
}

impl ServerMessage {
    /// Encode this message as a JSON text frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dead_event_shape() {
        let msg = ServerMessage::Dead {
            id: 7,
            score: 12,
            reason: DeathReason::Hit,
        };
        let json = msg.to_json().expect("should encode");
        assert_eq!(json, r#"{"type":"dead","id":7,"score":12,"reason":"hit"}"#);
    }

    #[test]
    fn test_left_event_shape() {
        let msg = ServerMessage::Left { id: 3 };
        assert_eq!(msg.to_json().expect("should encode"), r#"{"type":"left","id":3}"#);
    }

    #[test]
    fn test_orb_color_is_hex() {
        let msg = ServerMessage::Orbs {
            orbs: vec![OrbState {
                id: 1,
                x: 10.0,
                y: 20.0,
                color: Color::new(0xff, 0xee, 0x24),
                pop: 0.0,
            }],
        };
        let json = msg.to_json().expect("should encode");
        assert!(json.contains(r##""color":"#ffee24""##));
    }
}

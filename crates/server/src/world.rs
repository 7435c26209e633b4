//! World state management.
//!
//! The `World` aggregate owns every serpent and the orb field. All mutation
//! goes through an exclusive reference: the simulation tick and the intent
//! handlers never touch it concurrently.

use crate::config::Config;
use crate::entity::{Orb, Serpent};
use glam::Vec2;
use protocol::{Color, LeaderboardEntry};
use rand::Rng;
use std::collections::HashMap;
use std::f32::consts::TAU;

/// Attempts at placing a replacement orb clear of the consumer before the
/// last candidate is accepted as-is.
const MAX_SPAWN_ATTEMPTS: usize = 16;

/// The game world: all serpents plus the orb field.
#[derive(Debug)]
pub struct World {
    /// Serpents by connection id.
    pub serpents: HashMap<u32, Serpent>,
    /// The orb field. Its size is constant; slots are refilled in place.
    pub orbs: Vec<Orb>,
    /// Next orb id to assign.
    next_orb_id: u64,
}

impl World {
    /// Create a world with a fully populated orb field.
    pub fn new(config: &Config) -> Self {
        let mut world = Self {
            serpents: HashMap::new(),
            orbs: Vec::with_capacity(config.orb.count),
            next_orb_id: 1,
        };
        for _ in 0..config.orb.count {
            let orb = world.gen_orb(config);
            world.orbs.push(orb);
        }
        world
    }

    /// Generate an orb at a random position inside the spawn margin.
    pub fn gen_orb(&mut self, config: &Config) -> Orb {
        let id = self.next_orb_id;
        self.next_orb_id = self.next_orb_id.wrapping_add(1).max(1);

        let mut rng = rand::rng();
        let margin = config.orb.spawn_margin;
        let position = Vec2::new(
            rng.random_range(margin..config.arena.size - margin),
            rng.random_range(margin..config.arena.size - margin),
        );
        let color = pick_color(&config.orb.palette);

        Orb::new(id, position, color)
    }

    /// Generate a replacement orb kept clear of the consumer's head.
    ///
    /// Retries are bounded; after the last attempt the candidate is accepted
    /// even if it landed inside the clearance.
    pub fn gen_orb_clear_of(&mut self, config: &Config, head: Vec2) -> Orb {
        for _ in 0..MAX_SPAWN_ATTEMPTS {
            let orb = self.gen_orb(config);
            if orb.position.distance(head) > config.orb.respawn_clearance {
                return orb;
            }
        }
        self.gen_orb(config)
    }

    /// Random spawn point near the arena center.
    pub fn spawn_point(config: &Config) -> Vec2 {
        let mut rng = rand::rng();
        let center = config.arena.size / 2.0;
        let offset = config.serpent.spawn_offset;
        Vec2::new(
            center + rng.random_range(-offset..offset),
            center + rng.random_range(-offset..offset),
        )
    }

    /// Random initial heading in `[0, 2π)`.
    pub fn spawn_heading() -> f32 {
        rand::rng().random_range(0.0..TAU)
    }

    /// Register a fresh serpent for a connection, replacing any existing one.
    pub fn spawn_serpent(&mut self, id: u32, name: String, color: Color, config: &Config) {
        let serpent = Serpent::new(
            id,
            name,
            color,
            Self::spawn_point(config),
            Self::spawn_heading(),
            config.serpent.base_segments,
            config.serpent.spacing,
        );
        self.serpents.insert(id, serpent);
    }

    /// Reinitialize a serpent in place, keeping identity, name and color.
    /// Returns false when the connection has no serpent.
    pub fn respawn_serpent(&mut self, id: u32, config: &Config) -> bool {
        let Some(existing) = self.serpents.get(&id) else {
            return false;
        };
        let (name, color) = (existing.name.clone(), existing.color);
        self.spawn_serpent(id, name, color, config);
        true
    }

    /// Remove a serpent from the registry.
    pub fn remove_serpent(&mut self, id: u32) -> Option<Serpent> {
        self.serpents.remove(&id)
    }

    /// Top scoring living serpents, ties keeping registry iteration order.
    pub fn leaderboard(&self, size: usize) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self
            .serpents
            .values()
            .filter(|s| s.alive)
            .map(|s| LeaderboardEntry {
                id: s.id,
                name: s.name.clone(),
                score: s.score,
            })
            .collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        entries.truncate(size);
        entries
    }
}

fn pick_color(palette: &[Color]) -> Color {
    if palette.is_empty() {
        return Color::new(0x39, 0xff, 0xe1);
    }
    let mut rng = rand::rng();
    palette[rng.random_range(0..palette.len())]
}

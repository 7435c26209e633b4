//! Orb pickup entity.

use glam::Vec2;
use protocol::Color;

/// A static pickup that grows the serpent that touches it.
///
/// The field holds a fixed number of orbs; a consumed orb's slot is refilled
/// in place, so orbs are never removed without replacement.
#[derive(Debug, Clone)]
pub struct Orb {
    pub id: u64,
    pub position: Vec2,
    pub color: Color,
    /// Spawn pop-in animation value, decaying from 1.1 to 0.
    pub pop: f32,
}

impl Orb {
    pub fn new(id: u64, position: Vec2, color: Color) -> Self {
        Self {
            id,
            position,
            color,
            pop: 0.0,
        }
    }

    /// Age the pop-in animation by one tick.
    #[inline]
    pub fn decay_pop(&mut self, amount: f32) {
        self.pop = (self.pop - amount).max(0.0);
    }
}

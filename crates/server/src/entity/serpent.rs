//! Player-controlled serpent entity.

use glam::Vec2;
use protocol::Color;
use std::collections::VecDeque;

/// One decaying trail point emitted while boosting.
#[derive(Debug, Clone, Copy)]
pub struct Particle {
    pub position: Vec2,
    pub life: f32,
}

/// A player-controlled serpent: a head, a trailing body, and growth state.
#[derive(Debug, Clone)]
pub struct Serpent {
    /// Owning connection id.
    pub id: u32,
    pub name: String,
    pub color: Color,
    /// Head position; always equal to `segments[0]`.
    pub position: Vec2,
    /// Current movement angle in radians.
    pub heading: f32,
    /// Angle the controlling input wants to turn toward.
    pub desired_heading: f32,
    /// Body segments, head first.
    pub segments: VecDeque<Vec2>,
    /// Length the body is maintained toward; the segment count tracks
    /// `floor(target_length / spacing)` and never falls below the base length.
    pub target_length: f32,
    pub alive: bool,
    pub score: u32,
    /// Last-write-wins boost intent; actual activation is gated by length.
    pub boosting: bool,
    /// Boost reserve in `[0, 1]`.
    pub boost_reserve: f32,
    pub particles: Vec<Particle>,
    /// Unix millis of the last simulation step applied to this serpent.
    pub last_update_ms: u64,
}

impl Serpent {
    /// Create a serpent with a straight body trailing opposite the heading.
    pub fn new(
        id: u32,
        name: String,
        color: Color,
        spawn: Vec2,
        heading: f32,
        base_segments: usize,
        spacing: f32,
    ) -> Self {
        let back = -Vec2::from_angle(heading);
        let mut segments = VecDeque::with_capacity(base_segments * 2);
        for i in 0..base_segments {
            segments.push_back(spawn + back * (i as f32 * spacing));
        }

        Self {
            id,
            name,
            color,
            position: spawn,
            heading,
            desired_heading: heading,
            segments,
            target_length: base_segments as f32 * spacing,
            alive: true,
            score: 0,
            boosting: false,
            boost_reserve: 1.0,
            particles: Vec::new(),
            last_update_ms: 0,
        }
    }

    /// Current head position.
    #[inline]
    pub fn head(&self) -> Vec2 {
        self.position
    }
}

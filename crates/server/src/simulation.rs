//! The per-tick simulation core.
//!
//! Advances every live serpent by one fixed timestep: boost economics,
//! heading inertia, length-dependent speed, position integration, body
//! maintenance, orb consumption with safe respawn, and head-vs-body
//! collision against every other live serpent.

use crate::config::{Config, SerpentConfig};
use crate::entity::{Orb, Particle, Serpent};
use crate::world::World;
use glam::Vec2;
use protocol::DeathReason;
use rand::Rng;
use std::collections::VecDeque;
use std::f32::consts::{PI, TAU};

/// Pop-in animation value a replacement orb starts from.
const ORB_POP_START: f32 = 1.1;

/// Something that happened during a tick and must be announced immediately,
/// outside the periodic snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum TickEvent {
    OrbEaten { serpent_id: u32, orb_id: u64 },
    Died {
        serpent_id: u32,
        score: u32,
        reason: DeathReason,
    },
}

/// Advance the whole world by one tick.
///
/// Iterates serpents in registry order; the order is not part of the
/// contract and nothing here may depend on it.
pub fn tick(world: &mut World, config: &Config) -> Vec<TickEvent> {
    let mut events = Vec::new();
    let now = now_ms();

    let ids: Vec<u32> = world.serpents.keys().copied().collect();
    for id in ids {
        step_serpent(world, config, id, now, &mut events);
    }

    for orb in &mut world.orbs {
        orb.decay_pop(config.orb.pop_decay);
    }

    events
}

/// One serpent's full tick: movement and growth first, then consumption,
/// then collision against the other bodies.
fn step_serpent(
    world: &mut World,
    config: &Config,
    id: u32,
    now: u64,
    events: &mut Vec<TickEvent>,
) {
    let Some(head) = advance(world, config, id, events) else {
        return;
    };

    if let Some(slot) = find_orb_hit(&world.orbs, head, config) {
        let orb_id = world.orbs[slot].id;
        let mut replacement = world.gen_orb_clear_of(config, head);
        replacement.pop = ORB_POP_START;
        world.orbs[slot] = replacement;

        if let Some(serpent) = world.serpents.get_mut(&id) {
            serpent.target_length += config.serpent.growth_per_orb;
            serpent.score += 1;
            // The body catches up within the same tick, so the segment count
            // always tracks the target length once the tick completes.
            maintain_body(
                &mut serpent.segments,
                serpent.target_length,
                config.serpent.spacing,
            );
        }
        events.push(TickEvent::OrbEaten {
            serpent_id: id,
            orb_id,
        });
    }

    let radius_sq = config.collision.radius * config.collision.radius;
    let hit = world.serpents.iter().any(|(&other_id, other)| {
        other_id != id
            && other.alive
            && other
                .segments
                .iter()
                .skip(config.collision.neck_gap)
                .any(|seg| seg.distance_squared(head) < radius_sq)
    });
    if hit {
        if let Some(serpent) = world.serpents.get_mut(&id) {
            serpent.alive = false;
            events.push(TickEvent::Died {
                serpent_id: id,
                score: serpent.score,
                reason: DeathReason::Hit,
            });
        }
        return;
    }

    if let Some(serpent) = world.serpents.get_mut(&id) {
        age_particles(serpent, config.boost.particle_decay);
        serpent.last_update_ms = now;
    }
}

/// Boost economics, heading inertia, integration and body maintenance.
///
/// Returns the new head position, or `None` when the serpent is missing,
/// already dead, or died on the border this tick.
fn advance(
    world: &mut World,
    config: &Config,
    id: u32,
    events: &mut Vec<TickEvent>,
) -> Option<Vec2> {
    let serpent = world.serpents.get_mut(&id)?;
    if !serpent.alive {
        return None;
    }

    let base_length = config.serpent.base_length();
    let boost = &config.boost;

    let boost_active = serpent.boosting && serpent.target_length > base_length + boost.min_excess;
    if boost_active {
        serpent.target_length = (serpent.target_length - boost.cost_per_tick).max(base_length);
        serpent.boost_reserve = (serpent.boost_reserve - boost.drain_per_tick).max(0.0);
        if rand::rng().random::<f32>() < boost.particle_chance {
            serpent.particles.push(Particle {
                position: serpent.position,
                life: 1.0,
            });
        }
    } else {
        serpent.boost_reserve = (serpent.boost_reserve + boost.regen_per_tick).min(1.0);
    }
    if serpent.target_length <= base_length {
        serpent.boosting = false;
    }

    serpent.heading = turn_toward(
        serpent.heading,
        serpent.desired_heading,
        config.serpent.turn_rate,
    );

    let multiplier = if boost_active { boost.multiplier } else { 1.0 };
    let speed = speed_for(serpent.target_length, base_length, &config.serpent, multiplier);
    let head = serpent.position + Vec2::from_angle(serpent.heading) * speed;

    let lo = config.arena.wall_margin;
    let hi = config.arena.size - config.arena.wall_margin;
    if config.arena.border_kills && (head.x < lo || head.x > hi || head.y < lo || head.y > hi) {
        serpent.alive = false;
        events.push(TickEvent::Died {
            serpent_id: id,
            score: serpent.score,
            reason: DeathReason::Border,
        });
        return None;
    }
    let head = head.clamp(Vec2::splat(lo), Vec2::splat(hi));

    serpent.position = head;
    serpent.segments.push_front(head);
    maintain_body(
        &mut serpent.segments,
        serpent.target_length,
        config.serpent.spacing,
    );

    Some(head)
}

/// Signed shortest angular difference from `from` to `to`, in `(-π, π]`.
#[inline]
pub fn shortest_arc(from: f32, to: f32) -> f32 {
    let diff = (to - from).rem_euclid(TAU);
    if diff > PI { diff - TAU } else { diff }
}

/// Advance `heading` a fixed fraction of the remaining way toward `desired`.
#[inline]
pub fn turn_toward(heading: f32, desired: f32, turn_rate: f32) -> f32 {
    (heading + shortest_arc(heading, desired) * turn_rate).rem_euclid(TAU)
}

/// Baseline speed falls with body length beyond the base; boost multiplies
/// on top; the floor always wins.
#[inline]
pub fn speed_for(target_length: f32, base_length: f32, cfg: &SerpentConfig, multiplier: f32) -> f32 {
    let penalty = (target_length - base_length) * cfg.length_penalty;
    ((cfg.max_speed - penalty) * multiplier).max(cfg.min_speed)
}

/// Grow or trim the tail so the segment count tracks the target length.
///
/// New tail points are projected at fixed spacing along the direction from
/// the second-to-last to the last segment; a degenerate direction falls back
/// to duplicating the last segment.
pub fn maintain_body(segments: &mut VecDeque<Vec2>, target_length: f32, spacing: f32) {
    let required = (target_length / spacing).floor() as usize;

    while segments.len() > required {
        segments.pop_back();
    }
    while !segments.is_empty() && segments.len() < required {
        let n = segments.len();
        let last = segments[n - 1];
        let prev = if n >= 2 { segments[n - 2] } else { last };
        let dir = last - prev;
        let next = if dir.length_squared() > f32::EPSILON {
            last + dir.normalize() * spacing
        } else {
            last
        };
        segments.push_back(next);
    }
}

fn find_orb_hit(orbs: &[Orb], head: Vec2, config: &Config) -> Option<usize> {
    let reach = config.orb.radius + config.serpent.head_radius - config.serpent.eat_overlap;
    let reach_sq = reach * reach;
    orbs.iter()
        .position(|orb| orb.position.distance_squared(head) < reach_sq)
}

fn age_particles(serpent: &mut Serpent, decay: f32) {
    for particle in &mut serpent.particles {
        particle.life -= decay;
    }
    serpent.particles.retain(|p| p.life > 0.0);
}

/// Unix timestamp in milliseconds.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

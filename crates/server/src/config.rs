//! Server configuration.

use protocol::Color;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub arena: ArenaConfig,
    #[serde(default)]
    pub orb: OrbConfig,
    #[serde(default)]
    pub serpent: SerpentConfig,
    #[serde(default)]
    pub boost: BoostConfig,
    #[serde(default)]
    pub collision: CollisionConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

impl Config {
    /// Load configuration from `config.toml` or use defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = Path::new("config.toml");
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            info!("No config.toml found, creating default config");
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            Ok(default_config)
        }
    }
}

/// Server networking and timer settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Connections per IP limit.
    #[serde(default = "default_ip_limit")]
    pub ip_limit: usize,
    /// Simulation tick interval in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// State broadcast interval in milliseconds.
    #[serde(default = "default_broadcast_interval")]
    pub broadcast_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            max_connections: default_max_connections(),
            ip_limit: default_ip_limit(),
            tick_interval_ms: default_tick_interval(),
            broadcast_interval_ms: default_broadcast_interval(),
        }
    }
}

fn default_port() -> u16 {
    3000
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_max_connections() -> usize {
    100
}
fn default_ip_limit() -> usize {
    100
}
fn default_tick_interval() -> u64 {
    31
}
fn default_broadcast_interval() -> u64 {
    31
}

/// Arena configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArenaConfig {
    /// Side length of the square field.
    #[serde(default = "default_field_size")]
    pub size: f32,
    /// Distance from the wall at which heads are stopped (or killed).
    #[serde(default = "default_wall_margin")]
    pub wall_margin: f32,
    /// Kill a serpent that reaches the wall instead of clamping it there.
    #[serde(default)]
    pub border_kills: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            size: default_field_size(),
            wall_margin: default_wall_margin(),
            border_kills: false,
        }
    }
}

fn default_field_size() -> f32 {
    3000.0
}
fn default_wall_margin() -> f32 {
    14.0
}

/// Orb (collectible) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrbConfig {
    /// Number of orbs kept alive in the field at all times.
    #[serde(default = "default_orb_count")]
    pub count: usize,
    #[serde(default = "default_orb_radius")]
    pub radius: f32,
    /// Colors new orbs are drawn from.
    #[serde(default = "default_orb_palette")]
    pub palette: Vec<Color>,
    /// Per-tick decay of the spawn pop-in animation value.
    #[serde(default = "default_pop_decay")]
    pub pop_decay: f32,
    /// Minimum distance between a replacement orb and the consumer's head.
    #[serde(default = "default_respawn_clearance")]
    pub respawn_clearance: f32,
    /// Distance from the walls inside which orbs never spawn.
    #[serde(default = "default_orb_spawn_margin")]
    pub spawn_margin: f32,
}

impl Default for OrbConfig {
    fn default() -> Self {
        Self {
            count: default_orb_count(),
            radius: default_orb_radius(),
            palette: default_orb_palette(),
            pop_decay: default_pop_decay(),
            respawn_clearance: default_respawn_clearance(),
            spawn_margin: default_orb_spawn_margin(),
        }
    }
}

fn default_orb_count() -> usize {
    60
}
fn default_orb_radius() -> f32 {
    9.0
}
fn default_orb_palette() -> Vec<Color> {
    [
        "#ffee24", "#ff529b", "#27ffe1", "#55cbfb", "#ffa252", "#ea68ff", "#39ffe1", "#c9ff57",
        "#ff3333",
    ]
    .iter()
    .filter_map(|hex| Color::from_hex(hex))
    .collect()
}
fn default_pop_decay() -> f32 {
    0.06
}
fn default_respawn_clearance() -> f32 {
    200.0
}
fn default_orb_spawn_margin() -> f32 {
    40.0
}

/// Serpent body and movement configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerpentConfig {
    /// Segment count of a freshly spawned body.
    #[serde(default = "default_base_segments")]
    pub base_segments: usize,
    /// Distance between adjacent body segments.
    #[serde(default = "default_spacing")]
    pub spacing: f32,
    /// Display names are truncated to this many characters.
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
    /// Head radius used for orb pickup.
    #[serde(default = "default_head_radius")]
    pub head_radius: f32,
    /// Required overlap before an orb counts as touched.
    #[serde(default = "default_eat_overlap")]
    pub eat_overlap: f32,
    /// Target-length gain per consumed orb.
    #[serde(default = "default_growth_per_orb")]
    pub growth_per_orb: f32,
    #[serde(default = "default_min_speed")]
    pub min_speed: f32,
    #[serde(default = "default_max_speed")]
    pub max_speed: f32,
    /// Speed lost per unit of body length beyond the base length.
    #[serde(default = "default_length_penalty")]
    pub length_penalty: f32,
    /// Fraction of the remaining angular gap turned per tick.
    #[serde(default = "default_turn_rate")]
    pub turn_rate: f32,
    /// Spawn points land within this offset of the arena center, per axis.
    #[serde(default = "default_spawn_offset")]
    pub spawn_offset: f32,
}

impl SerpentConfig {
    /// Target length of a freshly spawned body.
    #[inline]
    pub fn base_length(&self) -> f32 {
        self.base_segments as f32 * self.spacing
    }
}

impl Default for SerpentConfig {
    fn default() -> Self {
        Self {
            base_segments: default_base_segments(),
            spacing: default_spacing(),
            max_name_length: default_max_name_length(),
            head_radius: default_head_radius(),
            eat_overlap: default_eat_overlap(),
            growth_per_orb: default_growth_per_orb(),
            min_speed: default_min_speed(),
            max_speed: default_max_speed(),
            length_penalty: default_length_penalty(),
            turn_rate: default_turn_rate(),
            spawn_offset: default_spawn_offset(),
        }
    }
}

fn default_base_segments() -> usize {
    22
}
fn default_spacing() -> f32 {
    8.0
}
fn default_max_name_length() -> usize {
    16
}
fn default_head_radius() -> f32 {
    14.0
}
fn default_eat_overlap() -> f32 {
    4.0
}
fn default_growth_per_orb() -> f32 {
    17.0
}
fn default_min_speed() -> f32 {
    2.1
}
fn default_max_speed() -> f32 {
    4.6
}
fn default_length_penalty() -> f32 {
    1.0 / 2600.0
}
fn default_turn_rate() -> f32 {
    0.09
}
fn default_spawn_offset() -> f32 {
    200.0
}

/// Boost economics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoostConfig {
    /// Speed multiplier while boosting.
    #[serde(default = "default_boost_multiplier")]
    pub multiplier: f32,
    /// Target length burned per boosting tick.
    #[serde(default = "default_boost_cost")]
    pub cost_per_tick: f32,
    /// Excess length over the base length required before boost engages.
    #[serde(default = "default_boost_min_excess")]
    pub min_excess: f32,
    /// Reserve drained per boosting tick.
    #[serde(default = "default_boost_drain")]
    pub drain_per_tick: f32,
    /// Reserve regained per non-boosting tick.
    #[serde(default = "default_boost_regen")]
    pub regen_per_tick: f32,
    /// Chance of emitting a trail particle on a boosting tick.
    #[serde(default = "default_particle_chance")]
    pub particle_chance: f32,
    /// Per-tick life lost by trail particles.
    #[serde(default = "default_particle_decay")]
    pub particle_decay: f32,
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            multiplier: default_boost_multiplier(),
            cost_per_tick: default_boost_cost(),
            min_excess: default_boost_min_excess(),
            drain_per_tick: default_boost_drain(),
            regen_per_tick: default_boost_regen(),
            particle_chance: default_particle_chance(),
            particle_decay: default_particle_decay(),
        }
    }
}

fn default_boost_multiplier() -> f32 {
    1.6
}
fn default_boost_cost() -> f32 {
    1.0
}
fn default_boost_min_excess() -> f32 {
    17.0
}
fn default_boost_drain() -> f32 {
    0.012
}
fn default_boost_regen() -> f32 {
    0.006
}
fn default_particle_chance() -> f32 {
    0.85
}
fn default_particle_decay() -> f32 {
    0.06
}

/// Collision configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollisionConfig {
    /// A head within this distance of a body segment dies.
    #[serde(default = "default_collision_radius")]
    pub radius: f32,
    /// Segments skipped at the front of the victim body.
    #[serde(default = "default_neck_gap")]
    pub neck_gap: usize,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            radius: default_collision_radius(),
            neck_gap: default_neck_gap(),
        }
    }
}

fn default_collision_radius() -> f32 {
    12.0
}
fn default_neck_gap() -> usize {
    10
}

/// Snapshot broadcast configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BroadcastConfig {
    /// Segments per serpent included in a snapshot.
    #[serde(default = "default_segment_cap")]
    pub segment_cap: usize,
    /// Particles per serpent included in a snapshot.
    #[serde(default = "default_particle_cap")]
    pub particle_cap: usize,
    /// Rows in the leaderboard.
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            segment_cap: default_segment_cap(),
            particle_cap: default_particle_cap(),
            leaderboard_size: default_leaderboard_size(),
        }
    }
}

fn default_segment_cap() -> usize {
    100
}
fn default_particle_cap() -> usize {
    32
}
fn default_leaderboard_size() -> usize {
    10
}

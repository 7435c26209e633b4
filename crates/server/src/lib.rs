//! Serpent arena game server library.

pub mod config;
pub mod entity;
pub mod server;
pub mod simulation;
pub mod world;

// Re-export commonly used types
pub use config::Config;
pub use server::{run, EventBroadcast, GameState, StateBroadcast, TargetedMessage};
pub use world::World;

//! Game entities.

mod orb;
mod serpent;

pub use orb::Orb;
pub use serpent::{Particle, Serpent};

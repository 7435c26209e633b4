//! Shared protocol crate for the serpent arena server.
//!
//! This crate contains:
//! - Client -> server intent messages
//! - Server -> client event and snapshot messages
//! - Shared wire types (Color, Point)
//!
//! Everything travels as JSON text frames over the WebSocket; the message
//! enums are tagged by a `type` field.

mod error;
pub mod messages;

pub use error::ProtocolError;
pub use messages::{
    ClientMessage, DeathReason, LeaderboardEntry, OrbState, ParticleState, PlayerSnapshot,
    PlayerState, ServerMessage,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// RGB color, carried on the wire as a `#rrggbb` hex literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a `#rrggbb` literal. Returns `None` for anything else.
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self { r, g, b })
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid color literal: {s:?}")))
    }
}

/// A 2D point in arena coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<glam::Vec2> for Point {
    fn from(v: glam::Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl From<Point> for glam::Vec2 {
    fn from(p: Point) -> Self {
        glam::Vec2::new(p.x, p.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex_round_trip() {
        let c = Color::new(0xff, 0x52, 0x9b);
        assert_eq!(c.to_string(), "#ff529b");
        assert_eq!(Color::from_hex("#ff529b"), Some(c));
    }

    #[test]
    fn test_color_rejects_garbage() {
        assert_eq!(Color::from_hex("ff529b"), None);
        assert_eq!(Color::from_hex("#ff529"), None);
        assert_eq!(Color::from_hex("#zzzzzz"), None);
        assert_eq!(Color::from_hex(""), None);
    }
}

//! Client -> server intent messages.

use crate::{Color, Point, ProtocolError};
use serde::Deserialize;

/// Parsed client intent.
///
/// Optional fields a client omits deserialize to `None` and must leave the
/// corresponding server-side state untouched.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Enter the arena with a display name and an optional body color.
    Join {
        name: String,
        #[serde(default)]
        color: Option<Color>,
    },
    /// Steer toward a point in arena coordinates and/or toggle boost.
    Move {
        #[serde(default)]
        target: Option<Point>,
        #[serde(default)]
        boost: Option<bool>,
    },
    /// Respawn after death.
    Restart,
    /// On-demand resync of the orb field.
    RequestOrbs,
}

impl ClientMessage {
    /// Parse a client message from a JSON text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_join() {
        let msg = ClientMessage::parse(r##"{"type":"join","name":"Al","color":"#27ffe1"}"##)
            .expect("join should parse");
        match msg {
            ClientMessage::Join { name, color } => {
                assert_eq!(name, "Al");
                assert_eq!(color, Some(Color::new(0x27, 0xff, 0xe1)));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_parse_join_without_color() {
        let msg = ClientMessage::parse(r#"{"type":"join","name":"Al"}"#).expect("should parse");
        assert!(matches!(msg, ClientMessage::Join { color: None, .. }));
    }

    #[test]
    fn test_move_fields_are_optional() {
        let msg = ClientMessage::parse(r#"{"type":"move","boost":true}"#).expect("should parse");
        match msg {
            ClientMessage::Move { target, boost } => {
                assert!(target.is_none());
                assert_eq!(boost, Some(true));
            }
            other => panic!("unexpected message: {other:?}"),
        }

        let msg = ClientMessage::parse(r#"{"type":"move","target":{"x":10.0,"y":-3.5}}"#)
            .expect("should parse");
        match msg {
            ClientMessage::Move { target, boost } => {
                assert_eq!(target, Some(Point::new(10.0, -3.5)));
                assert!(boost.is_none());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        assert!(ClientMessage::parse(r#"{"type":"teleport"}"#).is_err());
        assert!(ClientMessage::parse("not json").is_err());
    }
}

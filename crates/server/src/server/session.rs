//! Client session state.

use std::net::SocketAddr;

/// A connected client session.
///
/// A session exists from the WebSocket accept until disconnect; the serpent
/// it controls exists only between `join` and disconnect and lives in the
/// world registry under the same id.
#[derive(Debug)]
pub struct Session {
    /// Unique session id, shared with the serpent it controls.
    pub id: u32,
    /// Remote address.
    pub addr: SocketAddr,
}

impl Session {
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self { id, addr }
    }
}

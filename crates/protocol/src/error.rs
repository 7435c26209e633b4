//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while decoding or encoding messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

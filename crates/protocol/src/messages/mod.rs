//! Message definitions for the JSON wire protocol.
//!
//! This module contains both client->server and server->client message types.

mod client;
mod server;

pub use client::*;
pub use server::*;

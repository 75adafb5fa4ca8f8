//! Livepad Protocol
//!
//! Shared types for the edit channel between the browser editor and the
//! Livepad server. These types are serialized as JSON over WebSocket.

pub mod client;
pub mod server;

pub use client::ClientMessage;
pub use server::ServerMessage;

/// Identifier of a user workspace (storage partition for source and artifact).
pub type WorkspaceId = String;

//! Client → Server messages
//!
//! The browser sends a union of shapes on a single channel, distinguished by
//! which fields are present rather than by a tag:
//!
//! ```text
//! { "user": "u1", "sourceLines": ["let x: number = 1"] }   edit
//! { "resume": true, "userId": "u1" }                        resume request
//! ```
//!
//! Decoding goes through [`WireClientMessage`] so every shape maps onto an
//! explicit variant, with anything unrecognised landing in `Unknown`.

use serde::{Deserialize, Serialize};

use crate::WorkspaceId;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireClientMessage", into = "WireClientMessage")]
pub enum ClientMessage {
    /// Full source text of the editor, one entry per line.
    Edit {
        user: WorkspaceId,
        source_lines: Vec<String>,
    },
    /// A freshly connected tab asking for its last-known source.
    Resume { user_id: WorkspaceId },
    /// Valid JSON that matches no known shape. Ignored by the server.
    Unknown,
}

impl ClientMessage {
    /// Decode a text frame. Only malformed JSON is an error.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> String {
        // Plain strings and bools only; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Joined source text of an edit.
    pub fn source_text(&self) -> Option<String> {
        match self {
            ClientMessage::Edit { source_lines, .. } => Some(source_lines.join("\n")),
            _ => None,
        }
    }
}

/// Field-presence view of an inbound frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireClientMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_lines: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resume: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

impl From<WireClientMessage> for ClientMessage {
    fn from(wire: WireClientMessage) -> Self {
        match wire {
            WireClientMessage {
                resume: Some(true),
                user_id: Some(user_id),
                ..
            } => ClientMessage::Resume { user_id },
            WireClientMessage {
                user: Some(user),
                source_lines: Some(source_lines),
                ..
            } => ClientMessage::Edit { user, source_lines },
            _ => ClientMessage::Unknown,
        }
    }
}

impl From<ClientMessage> for WireClientMessage {
    fn from(msg: ClientMessage) -> Self {
        match msg {
            ClientMessage::Edit { user, source_lines } => WireClientMessage {
                user: Some(user),
                source_lines: Some(source_lines),
                ..Default::default()
            },
            ClientMessage::Resume { user_id } => WireClientMessage {
                resume: Some(true),
                user_id: Some(user_id),
                ..Default::default()
            },
            ClientMessage::Unknown => WireClientMessage::default(),
        }
    }
}

//! Server → Client messages

use serde::{Deserialize, Serialize};

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireServerMessage", into = "WireServerMessage")]
pub enum ServerMessage {
    /// The preview frame should refetch the artifact.
    Reload,
    /// Last-known source for a resuming client, one entry per line.
    Resume { content: Vec<String> },
    /// Anything else a client might receive from a newer server.
    Unknown,
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WireServerMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reload: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resume: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<Vec<String>>,
}

impl From<WireServerMessage> for ServerMessage {
    fn from(wire: WireServerMessage) -> Self {
        match wire {
            WireServerMessage {
                reload: Some(true), ..
            } => ServerMessage::Reload,
            WireServerMessage {
                resume: Some(true),
                content,
                ..
            } => ServerMessage::Resume {
                content: content.unwrap_or_default(),
            },
            _ => ServerMessage::Unknown,
        }
    }
}

impl From<ServerMessage> for WireServerMessage {
    fn from(msg: ServerMessage) -> Self {
        match msg {
            ServerMessage::Reload => WireServerMessage {
                reload: Some(true),
                ..Default::default()
            },
            ServerMessage::Resume { content } => WireServerMessage {
                resume: Some(true),
                content: Some(content),
                ..Default::default()
            },
            ServerMessage::Unknown => WireServerMessage::default(),
        }
    }
}

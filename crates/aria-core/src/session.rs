use crate::command::Command;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_ROOM_NAME: &str = "artex-call";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected {
        since: DateTime<Utc>,
    },
    /// Blocking error shown to the user until they retry.
    Failed {
        reason: String,
    },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub room_name: String,
    pub identity: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            room_name: DEFAULT_ROOM_NAME.to_string(),
            identity: generate_identity(),
        }
    }
}

impl SessionConfig {
    pub fn token_request(&self) -> TokenRequest {
        TokenRequest {
            room_name: self.room_name.clone(),
            identity: self.identity.clone(),
        }
    }
}

/// Body sent to the token-issuance service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    pub room_name: String,
    pub identity: String,
}

pub fn generate_identity() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("user-{}", &suffix[..6])
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("session channel is not connected")]
    NotConnected,
    #[error("command send failed: {0}")]
    Transport(String),
}

/// Outbound half of the session channel. Sends are fire-and-forget; the
/// only feedback is whether the transport accepted the text.
pub trait CommandSink {
    fn send(&mut self, command: &Command) -> Result<(), SendError>;
}

/// Formats whole seconds as `MM:SS`. Minutes keep growing past an hour.
pub fn format_duration(total_seconds: u64) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

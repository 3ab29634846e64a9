//! Message vocabulary shared by the queue, the store, and the HTTP surface

use serde::{Deserialize, Serialize};

/// What a message carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Text to be spoken on the device
    Tts,
    /// Reference to an uploaded audio blob
    Audio,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Tts => "tts",
            MessageKind::Audio => "audio",
        }
    }
}

impl std::str::FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "tts" => Ok(MessageKind::Tts),
            "audio" => Ok(MessageKind::Audio),
            _ => Err(format!("Unknown message kind: {}", s)),
        }
    }
}

/// Advisory priority; stored and returned but never affects delivery order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagePriority {
    #[default]
    Normal,
    Urgent,
}

impl MessagePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessagePriority::Normal => "normal",
            MessagePriority::Urgent => "urgent",
        }
    }
}

impl std::str::FromStr for MessagePriority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "normal" => Ok(MessagePriority::Normal),
            "urgent" => Ok(MessagePriority::Urgent),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Message lifecycle state
///
/// Created as `Queued`, flipped to `Delivered` when handed to a poll, and
/// finished in exactly one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageState {
    Queued,
    Delivered,
    Played,
    Failed,
    Expired,
}

impl MessageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageState::Queued => "queued",
            MessageState::Delivered => "delivered",
            MessageState::Played => "played",
            MessageState::Failed => "failed",
            MessageState::Expired => "expired",
        }
    }

    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MessageState::Played | MessageState::Failed | MessageState::Expired
        )
    }
}

impl std::str::FromStr for MessageState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "queued" => Ok(MessageState::Queued),
            "delivered" => Ok(MessageState::Delivered),
            "played" => Ok(MessageState::Played),
            "failed" => Ok(MessageState::Failed),
            "expired" => Ok(MessageState::Expired),
            _ => Err(format!("Unknown message state: {}", s)),
        }
    }
}

/// Delivery outcome reported by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Played,
    Failed,
    Expired,
}

impl AckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckStatus::Played => "played",
            AckStatus::Failed => "failed",
            AckStatus::Expired => "expired",
        }
    }
}

impl From<AckStatus> for MessageState {
    fn from(status: AckStatus) -> Self {
        match status {
            AckStatus::Played => MessageState::Played,
            AckStatus::Failed => MessageState::Failed,
            AckStatus::Expired => MessageState::Expired,
        }
    }
}

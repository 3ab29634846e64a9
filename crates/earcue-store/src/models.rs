//! Row models for Earcue storage.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    pub device_id: String,
    pub name: String,
    pub token_hash: String,
    pub paired_at: i64,
    pub last_seen_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PairingCode {
    pub code: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub used_at: Option<i64>,
    pub claimed_device_id: Option<String>,
}

impl PairingCode {
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// A queued notification. `kind`, `priority`, and `state` hold the lowercase
/// wire names; parsing into the typed vocabulary happens at the service layer.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub message_id: String,
    pub device_id: String,
    pub kind: String,
    pub text: Option<String>,
    pub audio_blob_key: Option<String>,
    pub priority: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub state: String,
    pub details: Option<String>,
}

impl Message {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AudioBlob {
    pub blob_key: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub file_path: String,
    pub created_at: i64,
}

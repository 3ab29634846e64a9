//! Delivery report processing.

use earcue_core::{AckStatus, Error, MessageState, Result};
use earcue_store::{now_millis, Message};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::queue::MessageQueue;

/// A device's report on what happened to a delivered message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckRequest {
    pub status: AckStatus,
    /// Free-text detail, e.g. a failure reason
    #[serde(default)]
    pub details: Option<String>,
}

/// Result of applying an acknowledgment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckOutcome {
    pub ok: bool,
    pub state: MessageState,
}

impl MessageQueue {
    /// Apply a device's delivery report to a message
    ///
    /// A report landing after expiry is reclassified as `expired` unless the
    /// device actually played the message. Terminal states are one-shot: the
    /// first report wins, and a later one gets the existing state back with
    /// nothing overwritten.
    pub async fn ack(
        &self,
        message: &Message,
        status: AckStatus,
        details: Option<&str>,
    ) -> Result<AckOutcome> {
        let mut new_state = MessageState::from(status);
        if message.is_expired(now_millis()) && new_state != MessageState::Played {
            new_state = MessageState::Expired;
        }

        let applied = self
            .db()
            .finalize_message(&message.message_id, new_state.as_str(), details)
            .await?;

        if !applied {
            let current = self.db().get_message(&message.message_id).await?;
            let state: MessageState = current.state.parse().map_err(Error::Storage)?;
            return Ok(AckOutcome { ok: true, state });
        }

        info!(
            message_id = %message.message_id,
            state = new_state.as_str(),
            "Message acknowledged"
        );

        Ok(AckOutcome {
            ok: true,
            state: new_state,
        })
    }
}

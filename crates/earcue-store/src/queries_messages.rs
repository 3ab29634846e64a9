//! Message queue queries.

use super::db::{now_millis, Database, DatabaseError};
use super::models::Message;

/// Parameters for enqueuing a message.
///
/// `created_at` and `expires_at` come from the caller so that the values
/// validated against each other are the values stored.
pub struct EnqueueMessageParams<'a> {
    pub message_id: &'a str,
    pub device_id: &'a str,
    pub kind: &'a str,
    pub text: Option<&'a str>,
    pub audio_blob_key: Option<&'a str>,
    pub priority: &'a str,
    pub created_at: i64,
    pub expires_at: i64,
}

impl Database {
    // =========================================================================
    // Message queue queries
    // =========================================================================

    /// Insert a message in `queued` state.
    pub async fn enqueue_message(
        &self,
        params: &EnqueueMessageParams<'_>,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO messages (message_id, device_id, kind, text, audio_blob_key, priority, created_at, expires_at, state, details) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'queued', NULL)",
        )
        .bind(params.message_id)
        .bind(params.device_id)
        .bind(params.kind)
        .bind(params.text)
        .bind(params.audio_blob_key)
        .bind(params.priority)
        .bind(params.created_at)
        .bind(params.expires_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Get a message by ID.
    pub async fn get_message(&self, message_id: &str) -> Result<Message, DatabaseError> {
        sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE message_id = ?")
            .bind(message_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Message {message_id}")))
    }

    /// Claim the oldest live queued message for a device, if any.
    ///
    /// Runs in one transaction: expire the device's overdue queued messages,
    /// pick the FIFO head among the survivors, and flip it to `delivered`.
    /// The flip is guarded on `state = 'queued'` so a message can only ever be
    /// claimed once.
    pub async fn fetch_next_message(
        &self,
        device_id: &str,
    ) -> Result<Option<Message>, DatabaseError> {
        let now = now_millis();
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "UPDATE messages SET state = 'expired' WHERE device_id = ? AND state = 'queued' AND expires_at <= ?",
        )
        .bind(device_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE device_id = ? AND state = 'queued' AND expires_at > ? ORDER BY created_at ASC, rowid ASC LIMIT 1",
        )
        .bind(device_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let mut message = match row {
            Some(m) => m,
            None => {
                tx.commit().await?;
                return Ok(None);
            }
        };

        let claimed = sqlx::query(
            "UPDATE messages SET state = 'delivered' WHERE message_id = ? AND state = 'queued'",
        )
        .bind(&message.message_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if claimed.rows_affected() == 0 {
            return Ok(None);
        }

        message.state = "delivered".to_string();
        Ok(Some(message))
    }

    /// Mark all overdue queued messages as expired, across every device.
    ///
    /// Returns the number of messages reclaimed.
    pub async fn sweep_expired_messages(&self) -> Result<u64, DatabaseError> {
        let now = now_millis();

        let result = sqlx::query(
            "UPDATE messages SET state = 'expired' WHERE state = 'queued' AND expires_at <= ?",
        )
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    /// Move a message into a terminal state, once.
    ///
    /// Only applies while the row is still `queued` or `delivered`; a message
    /// already in a terminal state keeps its state and details, and the call
    /// returns `Ok(false)`.
    pub async fn finalize_message(
        &self,
        message_id: &str,
        state: &str,
        details: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE messages SET state = ?, details = ? WHERE message_id = ? AND state IN ('queued', 'delivered')",
        )
        .bind(state)
        .bind(details)
        .bind(message_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

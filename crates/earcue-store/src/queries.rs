//! Device, pairing code, and audio blob queries.

use super::db::{now_millis, Database, DatabaseError};
use super::models::{AudioBlob, Device, PairingCode};

/// Parameters for registering a device while consuming its pairing code.
pub struct RedeemPairingParams<'a> {
    pub code: &'a str,
    pub device_id: &'a str,
    pub device_name: &'a str,
    pub token_hash: &'a str,
}

impl Database {
    // =========================================================================
    // Device queries
    // =========================================================================

    /// Get a device by ID.
    pub async fn get_device(&self, device_id: &str) -> Result<Device, DatabaseError> {
        sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE device_id = ?")
            .bind(device_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Device {device_id}")))
    }

    /// List all paired devices, most recently paired first.
    pub async fn list_devices(&self) -> Result<Vec<Device>, DatabaseError> {
        let devices =
            sqlx::query_as::<_, Device>("SELECT * FROM devices ORDER BY paired_at DESC")
                .fetch_all(self.pool())
                .await?;

        Ok(devices)
    }

    /// Update a device's `last_seen_at` timestamp.
    pub async fn touch_device(&self, device_id: &str) -> Result<(), DatabaseError> {
        let now = now_millis();

        sqlx::query("UPDATE devices SET last_seen_at = ? WHERE device_id = ?")
            .bind(now)
            .bind(device_id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    // =========================================================================
    // Pairing code queries
    // =========================================================================

    /// Persist a pairing code, replacing any dead row with the same value.
    ///
    /// Codes collide across time once expired or used; the primary key only
    /// has to be unique among live codes, so a remnant row is overwritten.
    pub async fn create_pairing_code(
        &self,
        code: &str,
        expires_at: i64,
    ) -> Result<(), DatabaseError> {
        let now = now_millis();

        sqlx::query(
            "INSERT OR REPLACE INTO pairing_codes (code, created_at, expires_at, used_at, claimed_device_id) VALUES (?, ?, ?, NULL, NULL)",
        )
        .bind(code)
        .bind(now)
        .bind(expires_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Get a pairing code row, used or not.
    pub async fn get_pairing_code(&self, code: &str) -> Result<Option<PairingCode>, DatabaseError> {
        let row = sqlx::query_as::<_, PairingCode>("SELECT * FROM pairing_codes WHERE code = ?")
            .bind(code)
            .fetch_optional(self.pool())
            .await?;

        Ok(row)
    }

    /// True if an unused, unexpired code with this value exists.
    pub async fn pairing_code_active(&self, code: &str) -> Result<bool, DatabaseError> {
        let now = now_millis();

        let row: Option<(String,)> = sqlx::query_as(
            "SELECT code FROM pairing_codes WHERE code = ? AND used_at IS NULL AND expires_at > ?",
        )
        .bind(code)
        .bind(now)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.is_some())
    }

    /// Atomically register a device and mark its pairing code used.
    ///
    /// The code update is guarded on `used_at IS NULL` and a live expiry, so
    /// only the first of two racing redemptions commits; the loser gets
    /// `Ok(false)` and no device row.
    pub async fn redeem_pairing_code(
        &self,
        params: &RedeemPairingParams<'_>,
    ) -> Result<bool, DatabaseError> {
        let now = now_millis();
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "INSERT INTO devices (device_id, name, token_hash, paired_at, last_seen_at) VALUES (?, ?, ?, ?, NULL)",
        )
        .bind(params.device_id)
        .bind(params.device_name)
        .bind(params.token_hash)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let claimed = sqlx::query(
            "UPDATE pairing_codes SET used_at = ?, claimed_device_id = ? WHERE code = ? AND used_at IS NULL AND expires_at > ?",
        )
        .bind(now)
        .bind(params.device_id)
        .bind(params.code)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }

    // =========================================================================
    // Audio blob queries
    // =========================================================================

    /// Record a converted audio blob.
    pub async fn create_audio_blob(
        &self,
        blob_key: &str,
        content_type: &str,
        size_bytes: i64,
        file_path: &str,
    ) -> Result<AudioBlob, DatabaseError> {
        let now = now_millis();

        sqlx::query(
            "INSERT INTO audio_blobs (blob_key, content_type, size_bytes, file_path, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(blob_key)
        .bind(content_type)
        .bind(size_bytes)
        .bind(file_path)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_audio_blob(blob_key).await
    }

    /// Get an audio blob by key.
    pub async fn get_audio_blob(&self, blob_key: &str) -> Result<AudioBlob, DatabaseError> {
        sqlx::query_as::<_, AudioBlob>("SELECT * FROM audio_blobs WHERE blob_key = ?")
            .bind(blob_key)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Audio blob {blob_key}")))
    }
}

//! Bearer token checks for operator and device endpoints

use earcue_core::{Error, Result};
use earcue_store::{Database, DatabaseError, Device};
use tracing::warn;

use crate::pairing::hash_token;

/// Validates bearer tokens against the admin secret or a device's stored token
pub struct AuthGuard {
    db: Database,
    admin_token: String,
}

impl AuthGuard {
    pub fn new(db: Database, admin_token: impl Into<String>) -> Self {
        Self {
            db,
            admin_token: admin_token.into(),
        }
    }

    fn is_admin(&self, bearer: Option<&str>) -> bool {
        matches!(bearer, Some(token) if token == self.admin_token)
    }

    /// Check the operator secret
    pub fn authenticate_admin(&self, bearer: Option<&str>) -> Result<()> {
        if self.is_admin(bearer) {
            Ok(())
        } else {
            warn!("Rejected request to an operator endpoint");
            Err(Error::unauthorized("admin"))
        }
    }

    /// Validate a device token without updating last-seen
    ///
    /// The ack path resolves its device through the message and must not
    /// count the report as device activity.
    pub async fn verify_device_token(
        &self,
        device_id: &str,
        bearer: Option<&str>,
    ) -> Result<Device> {
        let token = bearer.ok_or_else(|| Error::unauthorized("device"))?;

        let device = match self.db.get_device(device_id).await {
            Ok(device) => device,
            Err(DatabaseError::NotFound(_)) => {
                warn!(device_id = %device_id, "Token presented for unknown device");
                return Err(Error::unauthorized("device"));
            }
            Err(e) => return Err(e.into()),
        };

        if hash_token(token) != device.token_hash {
            warn!(device_id = %device_id, "Device token mismatch");
            return Err(Error::unauthorized("device"));
        }

        Ok(device)
    }

    /// Validate a device token and record the contact in last-seen
    pub async fn authenticate_device(
        &self,
        device_id: &str,
        bearer: Option<&str>,
    ) -> Result<Device> {
        let device = self.verify_device_token(device_id, bearer).await?;

        // Best effort; a failed timestamp update must not fail the request.
        let _ = self.db.touch_device(device_id).await;

        Ok(device)
    }

    /// Accept either the operator secret or the device's own token
    pub async fn authenticate_device_or_admin(
        &self,
        device_id: &str,
        bearer: Option<&str>,
    ) -> Result<()> {
        if self.is_admin(bearer) {
            return Ok(());
        }
        self.authenticate_device(device_id, bearer).await.map(|_| ())
    }
}

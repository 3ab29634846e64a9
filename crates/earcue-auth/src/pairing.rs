//! Device pairing with one-shot numeric codes
//!
//! Implements the pairing flow:
//! 1. Operator requests a code; server generates a 6-digit code with a short
//!    validity window
//! 2. Wearer enters the code on the device along with a device name
//! 3. Upon redemption the server registers the device and issues the bearer
//!    token used on every later request
//! 4. A code redeems exactly once; expired and used codes are refused

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Duration, Utc};
use earcue_store::{
    millis_to_utc, now_millis, Database, DatabaseError, Device, RedeemPairingParams,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Candidate codes drawn before giving up on collision avoidance
const CODE_ATTEMPTS: usize = 5;

/// Accepted length range for a submitted code
const MIN_CODE_LENGTH: usize = 4;
const MAX_CODE_LENGTH: usize = 12;

/// Longest accepted device name
const MAX_DEVICE_NAME_LENGTH: usize = 100;

/// Pairing errors
#[derive(Debug, Error)]
pub enum PairingError {
    #[error("Pairing code not found")]
    CodeNotFound,
    #[error("Pairing code already used")]
    CodeAlreadyUsed,
    #[error("Pairing code expired")]
    CodeExpired,
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

pub type PairingResult<T> = Result<T, PairingError>;

impl From<PairingError> for earcue_core::Error {
    fn from(e: PairingError) -> Self {
        match e {
            PairingError::CodeNotFound => earcue_core::Error::NotFound("Pairing code".into()),
            PairingError::CodeAlreadyUsed | PairingError::CodeExpired => {
                earcue_core::Error::Conflict(e.to_string())
            }
            PairingError::InvalidRequest(msg) => earcue_core::Error::InvalidInput(msg),
            PairingError::Storage(db) => db.into(),
        }
    }
}

/// Response when issuing a pairing code
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingStartResponse {
    /// The 6-digit code to display to the wearer
    pub code: String,
    /// When the code stops being redeemable
    pub expires_at: DateTime<Utc>,
}

/// Request to redeem a pairing code
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingCompleteRequest {
    /// The code read off the operator console
    pub code: String,
    /// Name shown in the device list
    pub device_name: String,
}

/// Response after successful redemption
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingCompleteResponse {
    /// The device ID assigned to this device
    pub device_id: String,
    /// Bearer token for all future requests; shown exactly once
    pub device_token: String,
}

/// Device summary for the operator console
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_id: String,
    pub name: String,
    pub paired_at: DateTime<Utc>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl From<&Device> for DeviceInfo {
    fn from(device: &Device) -> Self {
        Self {
            device_id: device.device_id.clone(),
            name: device.name.clone(),
            paired_at: millis_to_utc(device.paired_at),
            last_seen_at: device.last_seen_at.map(millis_to_utc),
        }
    }
}

/// Issues pairing codes and redeems them into registered devices
pub struct PairingManager {
    db: Database,
    /// How long an unredeemed code stays valid
    code_ttl: Duration,
}

impl PairingManager {
    /// Create a new pairing manager
    pub fn new(db: Database, code_ttl_seconds: i64) -> Self {
        Self {
            db,
            code_ttl: Duration::seconds(code_ttl_seconds),
        }
    }

    /// Issue a fresh pairing code
    pub async fn start_pairing(&self) -> PairingResult<PairingStartResponse> {
        // Re-roll while the candidate collides with a live code. After the
        // attempt budget the colliding value is overwritten rather than
        // refused; uniqueness among live codes is best-effort.
        let mut code = generate_code();
        for _ in 1..CODE_ATTEMPTS {
            if !self.db.pairing_code_active(&code).await? {
                break;
            }
            code = generate_code();
        }

        let expires_at = Utc::now() + self.code_ttl;
        self.db
            .create_pairing_code(&code, expires_at.timestamp_millis())
            .await?;

        info!("Issued pairing code");

        Ok(PairingStartResponse { code, expires_at })
    }

    /// Redeem a code into a new device registration
    pub async fn complete_pairing(
        &self,
        request: PairingCompleteRequest,
    ) -> PairingResult<PairingCompleteResponse> {
        let code_len = request.code.chars().count();
        if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&code_len) {
            return Err(PairingError::InvalidRequest(format!(
                "code must be {} to {} characters",
                MIN_CODE_LENGTH, MAX_CODE_LENGTH
            )));
        }
        let name_len = request.device_name.chars().count();
        if !(1..=MAX_DEVICE_NAME_LENGTH).contains(&name_len) {
            return Err(PairingError::InvalidRequest(format!(
                "deviceName must be 1 to {} characters",
                MAX_DEVICE_NAME_LENGTH
            )));
        }

        let row = self
            .db
            .get_pairing_code(&request.code)
            .await?
            .ok_or(PairingError::CodeNotFound)?;

        if row.is_used() {
            warn!("Attempt to reuse a pairing code");
            return Err(PairingError::CodeAlreadyUsed);
        }
        if row.is_expired(now_millis()) {
            return Err(PairingError::CodeExpired);
        }

        let token = generate_token();
        let token_hash = hash_token(&token);
        let device_id = Uuid::new_v4().to_string();

        let claimed = self
            .db
            .redeem_pairing_code(&RedeemPairingParams {
                code: &request.code,
                device_id: &device_id,
                device_name: &request.device_name,
                token_hash: &token_hash,
            })
            .await?;

        if !claimed {
            // Lost the redemption race, or the code expired after the check
            // above. Reclassify from the row as it stands now.
            return match self.db.get_pairing_code(&request.code).await? {
                Some(row) if row.is_used() => Err(PairingError::CodeAlreadyUsed),
                _ => Err(PairingError::CodeExpired),
            };
        }

        info!(device_id = %device_id, "Device paired");

        Ok(PairingCompleteResponse {
            device_id,
            device_token: token,
        })
    }

    /// List all paired devices, most recently paired first
    pub async fn list_devices(&self) -> PairingResult<Vec<Device>> {
        Ok(self.db.list_devices().await?)
    }
}

/// Generate a 6-digit pairing code, leading zeros allowed
fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    let code: u32 = rng.gen_range(0..1_000_000);
    format!("{:06}", code)
}

/// Generate a secure random token
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    BASE64.encode(bytes)
}

/// Hash a token for storage
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let result = hasher.finalize();
    BASE64.encode(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_manager() -> (PairingManager, Database) {
        let db = Database::open_in_memory().await.unwrap();
        let manager = PairingManager::new(db.clone(), 300);
        (manager, db)
    }

    fn complete_request(code: &str, name: &str) -> PairingCompleteRequest {
        PairingCompleteRequest {
            code: code.to_string(),
            device_name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_pairing_flow() {
        let (manager, db) = create_test_manager().await;

        let start = manager.start_pairing().await.unwrap();
        assert_eq!(start.code.len(), 6);
        assert!(start.code.chars().all(|c| c.is_ascii_digit()));

        let response = manager
            .complete_pairing(complete_request(&start.code, "Kitchen Headset"))
            .await
            .unwrap();
        assert!(!response.device_id.is_empty());
        assert!(!response.device_token.is_empty());

        // Only the hash of the token is at rest.
        let device = db.get_device(&response.device_id).await.unwrap();
        assert_eq!(device.name, "Kitchen Headset");
        assert_eq!(device.token_hash, hash_token(&response.device_token));
        assert_ne!(device.token_hash, response.device_token);
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let (manager, _db) = create_test_manager().await;

        let result = manager
            .complete_pairing(complete_request("000000", "Test"))
            .await;
        assert!(matches!(result, Err(PairingError::CodeNotFound)));
    }

    #[tokio::test]
    async fn test_code_redeems_only_once() {
        let (manager, _db) = create_test_manager().await;

        let start = manager.start_pairing().await.unwrap();
        manager
            .complete_pairing(complete_request(&start.code, "First"))
            .await
            .unwrap();

        let again = manager
            .complete_pairing(complete_request(&start.code, "Second"))
            .await;
        assert!(matches!(again, Err(PairingError::CodeAlreadyUsed)));
    }

    #[tokio::test]
    async fn test_expired_code() {
        let db = Database::open_in_memory().await.unwrap();
        let manager = PairingManager::new(db, 0);

        let start = manager.start_pairing().await.unwrap();
        let result = manager
            .complete_pairing(complete_request(&start.code, "Late"))
            .await;
        assert!(matches!(result, Err(PairingError::CodeExpired)));
    }

    #[tokio::test]
    async fn test_request_validation() {
        let (manager, _db) = create_test_manager().await;

        let short_code = manager.complete_pairing(complete_request("12", "Test")).await;
        assert!(matches!(short_code, Err(PairingError::InvalidRequest(_))));

        let empty_name = manager
            .complete_pairing(complete_request("123456", ""))
            .await;
        assert!(matches!(empty_name, Err(PairingError::InvalidRequest(_))));

        let long_name = "x".repeat(101);
        let result = manager
            .complete_pairing(complete_request("123456", &long_name))
            .await;
        assert!(matches!(result, Err(PairingError::InvalidRequest(_))));
    }

    #[test]
    fn test_token_hashing() {
        let token = "test_token_123";
        let hash1 = hash_token(token);
        let hash2 = hash_token(token);
        assert_eq!(hash1, hash2);

        let different_hash = hash_token("different_token");
        assert_ne!(hash1, different_hash);
    }
}

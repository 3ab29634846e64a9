//! Enqueue and long-poll delivery.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use earcue_core::{Error, MessageKind, MessagePriority, Result};
use earcue_store::{millis_to_utc, Database, EnqueueMessageParams, Message};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::hub::NotificationHub;

/// Clamp bounds for a requested long-poll timeout, in seconds
const MIN_POLL_SECS: u64 = 1;
const MAX_POLL_SECS: u64 = 120;

/// Longest accepted message TTL, in seconds
const MAX_TTL_SECS: i64 = 86_400;

/// Request to queue a message for a device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    /// What the device should do with the message
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Text to speak; required for tts, optional alongside audio
    #[serde(default)]
    pub text: Option<String>,
    /// Uploaded blob to play; required for audio
    #[serde(default)]
    pub audio_blob_key: Option<String>,
    #[serde(default)]
    pub priority: MessagePriority,
    /// Relative lifetime in seconds; the configured default applies when
    /// neither this nor `expiresAt` is given
    #[serde(default)]
    pub ttl_seconds: Option<i64>,
    /// Absolute expiry; takes precedence over `ttlSeconds`
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Response after enqueuing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    pub message_id: String,
    pub expires_at: DateTime<Utc>,
}

/// A message handed to a polling device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextMessage {
    pub message_id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub text: Option<String>,
    /// Where to fetch the audio payload, when there is one
    pub audio_url: Option<String>,
    pub audio_blob_key: Option<String>,
    pub priority: MessagePriority,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NextMessage {
    fn from_message(message: &Message) -> Result<Self> {
        let kind: MessageKind = message.kind.parse().map_err(Error::Storage)?;
        let priority: MessagePriority = message.priority.parse().map_err(Error::Storage)?;

        let audio_url = match (kind, message.audio_blob_key.as_deref()) {
            (MessageKind::Audio, Some(key)) if !key.is_empty() => Some(format!(
                "/api/devices/{}/audio/{}",
                message.device_id, key
            )),
            _ => None,
        };

        Ok(Self {
            message_id: message.message_id.clone(),
            kind,
            text: message.text.clone(),
            audio_url,
            audio_blob_key: message.audio_blob_key.clone(),
            priority,
            created_at: millis_to_utc(message.created_at),
            expires_at: millis_to_utc(message.expires_at),
        })
    }
}

/// Persistent per-device message queue
pub struct MessageQueue {
    db: Database,
    hub: NotificationHub,
    /// TTL applied when an enqueue request does not set one, in seconds
    default_ttl_secs: i64,
}

impl MessageQueue {
    pub fn new(db: Database, default_ttl_secs: i64) -> Self {
        Self {
            db,
            hub: NotificationHub::new(),
            default_ttl_secs,
        }
    }

    /// Queue a message and wake the device's waiters
    pub async fn enqueue(
        &self,
        device_id: &str,
        request: EnqueueRequest,
    ) -> Result<EnqueueResponse> {
        self.db.get_device(device_id).await?;

        let text = request.text.as_deref().map(str::trim).unwrap_or("");
        match request.kind {
            MessageKind::Tts => {
                if text.is_empty() {
                    return Err(Error::invalid_input("text is required for type=tts"));
                }
            }
            MessageKind::Audio => {
                match request.audio_blob_key.as_deref() {
                    None | Some("") => {
                        return Err(Error::invalid_input(
                            "audioBlobKey is required for type=audio",
                        ));
                    }
                    Some(key) => {
                        self.db.get_audio_blob(key).await?;
                    }
                }
            }
        }

        let now = Utc::now();
        let expires_at = match request.expires_at {
            Some(expires_at) => expires_at,
            None => {
                let ttl = request.ttl_seconds.unwrap_or(self.default_ttl_secs);
                if !(1..=MAX_TTL_SECS).contains(&ttl) {
                    return Err(Error::invalid_input(
                        "ttlSeconds must be between 1 and 86400",
                    ));
                }
                now + Duration::seconds(ttl)
            }
        };

        // Validate at storage granularity so the stored pair keeps the
        // strict ordering.
        let created_ms = now.timestamp_millis();
        let expires_ms = expires_at.timestamp_millis();
        if expires_ms <= created_ms {
            return Err(Error::invalid_input("expiresAt must be in the future"));
        }

        let message_id = Uuid::new_v4().to_string();
        self.db
            .enqueue_message(&EnqueueMessageParams {
                message_id: &message_id,
                device_id,
                kind: request.kind.as_str(),
                text: if text.is_empty() { None } else { Some(text) },
                audio_blob_key: request.audio_blob_key.as_deref(),
                priority: request.priority.as_str(),
                created_at: created_ms,
                expires_at: expires_ms,
            })
            .await?;

        self.hub.signal(device_id).await;

        info!(
            device_id = %device_id,
            message_id = %message_id,
            kind = request.kind.as_str(),
            "Message queued"
        );

        Ok(EnqueueResponse {
            message_id,
            expires_at: millis_to_utc(expires_ms),
        })
    }

    /// Wait up to the requested timeout for the device's next message
    ///
    /// The timeout is clamped into [1, 120] seconds. Every round subscribes
    /// to the hub before checking the queue, so a signal landing between
    /// check and wait still completes the wait; a wake is only a hint and the
    /// queue is re-checked, since a concurrent poll may have claimed the
    /// message. Returns `None` once the deadline passes with nothing queued.
    pub async fn poll_next(
        &self,
        device_id: &str,
        timeout_secs: u64,
    ) -> Result<Option<NextMessage>> {
        let wait = timeout_secs.clamp(MIN_POLL_SECS, MAX_POLL_SECS);
        let deadline = Instant::now() + StdDuration::from_secs(wait);

        loop {
            let mut rx = self.hub.subscribe(device_id).await;

            if let Some(message) = self.db.fetch_next_message(device_id).await? {
                info!(
                    device_id = %device_id,
                    message_id = %message.message_id,
                    "Message delivered"
                );
                return Ok(Some(NextMessage::from_message(&message)?));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            match tokio::time::timeout(remaining, rx.changed()).await {
                Ok(_) => continue,
                Err(_) => return Ok(None),
            }
        }
    }

    /// Look up a message by ID
    pub async fn get_message(&self, message_id: &str) -> Result<Message> {
        Ok(self.db.get_message(message_id).await?)
    }

    /// Reclaim expired queued messages across all devices
    pub async fn sweep_expired(&self) -> Result<u64> {
        Ok(self.db.sweep_expired_messages().await?)
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use earcue_store::{now_millis, RedeemPairingParams};

    async fn setup() -> (Arc<MessageQueue>, Database) {
        let db = Database::open_in_memory().await.unwrap();
        db.create_pairing_code("123456", now_millis() + 60_000)
            .await
            .unwrap();
        db.redeem_pairing_code(&RedeemPairingParams {
            code: "123456",
            device_id: "d1",
            device_name: "Test Headphones",
            token_hash: "hash",
        })
        .await
        .unwrap();

        (Arc::new(MessageQueue::new(db.clone(), 600)), db)
    }

    fn tts_request(text: &str) -> EnqueueRequest {
        EnqueueRequest {
            kind: MessageKind::Tts,
            text: Some(text.to_string()),
            audio_blob_key: None,
            priority: MessagePriority::Normal,
            ttl_seconds: Some(60),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn enqueue_then_poll_returns_immediately() {
        let (queue, _db) = setup().await;

        let queued = queue.enqueue("d1", tts_request("hello")).await.unwrap();

        let started = Instant::now();
        let message = queue.poll_next("d1", 5).await.unwrap().unwrap();
        assert!(started.elapsed() < StdDuration::from_secs(1));

        assert_eq!(message.message_id, queued.message_id);
        assert_eq!(message.kind, MessageKind::Tts);
        assert_eq!(message.text.as_deref(), Some("hello"));
        assert!(message.audio_url.is_none());
    }

    #[tokio::test]
    async fn message_is_delivered_exactly_once() {
        let (queue, db) = setup().await;

        let queued = queue.enqueue("d1", tts_request("once")).await.unwrap();
        queue.poll_next("d1", 5).await.unwrap().unwrap();

        assert_eq!(db.get_message(&queued.message_id).await.unwrap().state, "delivered");
        assert!(queue.poll_next("d1", 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_poll_waits_about_the_timeout() {
        let (queue, _db) = setup().await;

        let started = Instant::now();
        let result = queue.poll_next("d1", 1).await.unwrap();
        let elapsed = started.elapsed();

        assert!(result.is_none());
        assert!(elapsed >= StdDuration::from_secs(1));
        assert!(elapsed < StdDuration::from_millis(2500));
    }

    #[tokio::test]
    async fn zero_timeout_is_clamped_up() {
        let (queue, _db) = setup().await;

        let started = Instant::now();
        assert!(queue.poll_next("d1", 0).await.unwrap().is_none());
        assert!(started.elapsed() >= StdDuration::from_secs(1));
    }

    #[tokio::test]
    async fn enqueue_wakes_a_waiting_poll() {
        let (queue, _db) = setup().await;

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move {
                let started = Instant::now();
                let message = queue.poll_next("d1", 10).await.unwrap();
                (message, started.elapsed())
            })
        };

        tokio::time::sleep(StdDuration::from_millis(100)).await;
        queue.enqueue("d1", tts_request("wake up")).await.unwrap();

        let (message, elapsed) = waiter.await.unwrap();
        assert_eq!(message.unwrap().text.as_deref(), Some("wake up"));
        assert!(elapsed < StdDuration::from_secs(2));
    }

    #[tokio::test]
    async fn delivery_is_fifo_per_device() {
        let (queue, _db) = setup().await;

        queue.enqueue("d1", tts_request("first")).await.unwrap();
        queue.enqueue("d1", tts_request("second")).await.unwrap();

        let a = queue.poll_next("d1", 1).await.unwrap().unwrap();
        let b = queue.poll_next("d1", 1).await.unwrap().unwrap();
        assert_eq!(a.text.as_deref(), Some("first"));
        assert_eq!(b.text.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn expired_message_is_never_delivered() {
        let (queue, db) = setup().await;

        let mut request = tts_request("doomed");
        request.ttl_seconds = None;
        request.expires_at = Some(Utc::now() + Duration::milliseconds(50));
        let queued = queue.enqueue("d1", request).await.unwrap();

        tokio::time::sleep(StdDuration::from_millis(60)).await;

        assert!(queue.poll_next("d1", 1).await.unwrap().is_none());
        assert_eq!(db.get_message(&queued.message_id).await.unwrap().state, "expired");
    }

    #[tokio::test]
    async fn default_ttl_applies_when_unset() {
        let (queue, _db) = setup().await;

        let mut request = tts_request("default ttl");
        request.ttl_seconds = None;
        let queued = queue.enqueue("d1", request).await.unwrap();

        let ttl = queued.expires_at - Utc::now();
        assert!(ttl > Duration::seconds(598));
        assert!(ttl <= Duration::seconds(600));
    }

    #[tokio::test]
    async fn enqueue_validation() {
        let (queue, db) = setup().await;

        let no_text = EnqueueRequest {
            text: None,
            ..tts_request("")
        };
        assert!(matches!(
            queue.enqueue("d1", no_text).await,
            Err(Error::InvalidInput(_))
        ));

        let blank_text = tts_request("   ");
        assert!(matches!(
            queue.enqueue("d1", blank_text).await,
            Err(Error::InvalidInput(_))
        ));

        let audio_without_key = EnqueueRequest {
            kind: MessageKind::Audio,
            text: None,
            ..tts_request("")
        };
        assert!(matches!(
            queue.enqueue("d1", audio_without_key).await,
            Err(Error::InvalidInput(_))
        ));

        let audio_with_ghost_key = EnqueueRequest {
            kind: MessageKind::Audio,
            text: None,
            audio_blob_key: Some("b_missing".to_string()),
            ..tts_request("")
        };
        assert!(matches!(
            queue.enqueue("d1", audio_with_ghost_key).await,
            Err(Error::NotFound(_))
        ));

        for bad_ttl in [0, -5, 86_401] {
            let mut request = tts_request("ttl");
            request.ttl_seconds = Some(bad_ttl);
            assert!(matches!(
                queue.enqueue("d1", request).await,
                Err(Error::InvalidInput(_))
            ));
        }

        let mut past_expiry = tts_request("past");
        past_expiry.ttl_seconds = None;
        past_expiry.expires_at = Some(Utc::now() - Duration::seconds(5));
        assert!(matches!(
            queue.enqueue("d1", past_expiry).await,
            Err(Error::InvalidInput(_))
        ));

        assert!(matches!(
            queue.enqueue("ghost", tts_request("nobody")).await,
            Err(Error::NotFound(_))
        ));

        // Audio with a real blob passes and carries the fetch URL.
        db.create_audio_blob("b_real", "audio/wav", 128, "/tmp/b_real.wav")
            .await
            .unwrap();
        let audio = EnqueueRequest {
            kind: MessageKind::Audio,
            text: None,
            audio_blob_key: Some("b_real".to_string()),
            ..tts_request("")
        };
        queue.enqueue("d1", audio).await.unwrap();
        let message = queue.poll_next("d1", 1).await.unwrap().unwrap();
        assert_eq!(
            message.audio_url.as_deref(),
            Some("/api/devices/d1/audio/b_real")
        );
        assert_eq!(message.audio_blob_key.as_deref(), Some("b_real"));
    }
}

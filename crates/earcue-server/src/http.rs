//! HTTP request handlers
//!
//! Operator endpoints (pairing start, device list, uploads, enqueue) check the
//! admin token; device endpoints check the per-device bearer token minted at
//! pairing time.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path as AxumPath, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use earcue_audio::{extension_hint, StoredBlob};
use earcue_auth::{
    DeviceInfo, PairingCompleteRequest, PairingCompleteResponse, PairingStartResponse,
};
use earcue_core::Error;
use earcue_queue::{AckOutcome, AckRequest, EnqueueRequest, EnqueueResponse};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::state::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Liveness
        .route("/healthz", get(healthz_handler))
        // Pairing API
        .route("/api/pairing/start", post(pairing_start_handler))
        .route("/api/pairing/complete", post(pairing_complete_handler))
        // Device management API
        .route("/api/devices", get(list_devices_handler))
        // Audio upload and retrieval
        .route("/api/uploads/audio", post(upload_audio_handler))
        .route(
            "/api/devices/:device_id/audio/:blob_key",
            get(get_audio_handler),
        )
        // Message delivery API
        .route("/api/devices/:device_id/messages", post(enqueue_handler))
        .route(
            "/api/devices/:device_id/messages/next",
            get(poll_next_handler),
        )
        .route("/api/messages/:message_id/ack", post(ack_handler))
        // Uploaded clips can exceed axum's 2 MB default body cap
        .layer(DefaultBodyLimit::max(32 * 1024 * 1024))
        .with_state(state)
}

/// Liveness probe
async fn healthz_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true, "time": Utc::now() }))
}

// ============================================================================
// Pairing API Handlers
// ============================================================================

/// Mint a short-lived pairing code for a new device
async fn pairing_start_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<PairingStartResponse>, (StatusCode, String)> {
    state
        .guard
        .authenticate_admin(bearer_token(&headers))
        .map_err(error_response)?;

    state
        .pairing
        .start_pairing()
        .await
        .map(Json)
        .map_err(|e| error_response(e.into()))
}

/// Redeem a pairing code and register the device
///
/// No bearer token here: the pairing code itself is the credential.
async fn pairing_complete_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PairingCompleteRequest>,
) -> Result<Json<PairingCompleteResponse>, (StatusCode, String)> {
    state
        .pairing
        .complete_pairing(request)
        .await
        .map(Json)
        .map_err(|e| error_response(e.into()))
}

// ============================================================================
// Device Management Handlers
// ============================================================================

/// List all paired devices, newest first
async fn list_devices_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<DeviceInfo>>, (StatusCode, String)> {
    state
        .guard
        .authenticate_admin(bearer_token(&headers))
        .map_err(error_response)?;

    let devices = state
        .pairing
        .list_devices()
        .await
        .map_err(|e| error_response(e.into()))?;
    let infos: Vec<DeviceInfo> = devices.iter().map(DeviceInfo::from).collect();
    Ok(Json(infos))
}

// ============================================================================
// Audio Handlers
// ============================================================================

/// Accept an audio upload, convert it to the device WAV format, and store it
///
/// Expects a multipart body with a `file` field. The stored blob key is what
/// an enqueue request references for `type=audio` messages.
async fn upload_audio_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<StoredBlob>, (StatusCode, String)> {
    state
        .guard
        .authenticate_admin(bearer_token(&headers))
        .map_err(error_response)?;

    let mut upload: Option<(Option<String>, Option<String>, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| error_response(Error::invalid_input(format!("Malformed upload: {}", e))))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| error_response(Error::invalid_input(format!("Malformed upload: {}", e))))?;
        upload = Some((filename, content_type, data.to_vec()));
        break;
    }

    let (filename, content_type, data) = upload.ok_or_else(|| {
        error_response(Error::invalid_input("multipart field 'file' is required"))
    })?;
    if data.is_empty() {
        return Err(error_response(Error::invalid_input("Empty file")));
    }

    let hint = extension_hint(filename.as_deref(), content_type.as_deref());
    let wav = state
        .transcoder
        .to_wav(&data, &hint)
        .await
        .map_err(error_response)?;
    let stored = state.blobs.store_wav(&wav).await.map_err(error_response)?;
    Ok(Json(stored))
}

/// Serve a converted audio blob with its stored content type
async fn get_audio_handler(
    State(state): State<Arc<AppState>>,
    AxumPath((device_id, blob_key)): AxumPath<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, (StatusCode, String)> {
    state
        .guard
        .authenticate_device_or_admin(&device_id, bearer_token(&headers))
        .await
        .map_err(error_response)?;

    debug!("Serving blob: {}", blob_key);

    let (content_type, bytes) = state.blobs.read(&blob_key).await.map_err(error_response)?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

// ============================================================================
// Message Handlers
// ============================================================================

/// Queue a message for a device
async fn enqueue_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(device_id): AxumPath<String>,
    headers: HeaderMap,
    Json(request): Json<EnqueueRequest>,
) -> Result<Json<EnqueueResponse>, (StatusCode, String)> {
    state
        .guard
        .authenticate_admin(bearer_token(&headers))
        .map_err(error_response)?;

    state
        .queue
        .enqueue(&device_id, request)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Query parameters for the long poll
#[derive(Debug, Deserialize)]
pub struct PollQuery {
    /// Seconds to wait for a message before giving up
    timeout: Option<u64>,
}

/// Long-poll for the next queued message
///
/// Returns the message as JSON, or 204 when the wait elapses with the queue
/// still empty.
async fn poll_next_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(device_id): AxumPath<String>,
    Query(query): Query<PollQuery>,
    headers: HeaderMap,
) -> Result<Response, (StatusCode, String)> {
    state
        .guard
        .authenticate_device(&device_id, bearer_token(&headers))
        .await
        .map_err(error_response)?;

    let timeout = query
        .timeout
        .unwrap_or(state.config.default_poll_timeout_seconds);

    match state
        .queue
        .poll_next(&device_id, timeout)
        .await
        .map_err(error_response)?
    {
        Some(message) => Ok(Json(message).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Record a device's playback report for a delivered message
///
/// The device is resolved through the message, so a token for a different
/// device is rejected even when the message ID is valid.
async fn ack_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(message_id): AxumPath<String>,
    headers: HeaderMap,
    Json(request): Json<AckRequest>,
) -> Result<Json<AckOutcome>, (StatusCode, String)> {
    let message = state
        .queue
        .get_message(&message_id)
        .await
        .map_err(error_response)?;

    state
        .guard
        .verify_device_token(&message.device_id, bearer_token(&headers))
        .await
        .map_err(error_response)?;

    state
        .queue
        .ack(&message, request.status, request.details.as_deref())
        .await
        .map(Json)
        .map_err(error_response)
}

// ============================================================================
// Helpers
// ============================================================================

/// Pull the bearer token out of the Authorization header, if any
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Map a service error onto an HTTP status, with the error text as the body
fn error_response(err: Error) -> (StatusCode, String) {
    let status = match &err {
        Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::ConversionFailed(_) | Error::Storage(_) | Error::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer tok-123".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("tok-123"));

        headers.insert(header::AUTHORIZATION, "Basic dXNlcg==".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_error_status_mapping() {
        let (status, body) = error_response(Error::unauthorized("admin"));
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("admin"));

        let (status, _) = error_response(Error::not_found("Device d1"));
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = error_response(Error::invalid_input("text is required"));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = error_response(Error::Conflict("Pairing code already used".into()));
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = error_response(Error::ConversionFailed("ffmpeg failed".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _) = error_response(Error::Storage("disk on fire".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}

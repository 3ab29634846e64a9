//! Shared application state handed to every request handler

use earcue_audio::{BlobStore, Transcoder};
use earcue_auth::{AuthGuard, PairingManager};
use earcue_core::Config;
use earcue_queue::MessageQueue;

/// Shared application state
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// Admin and device bearer token checks
    pub guard: AuthGuard,
    /// Pairing code lifecycle
    pub pairing: PairingManager,
    /// Per-device message queue with long-poll delivery
    pub queue: MessageQueue,
    /// Converted audio blobs on disk
    pub blobs: BlobStore,
    /// ffmpeg wrapper used for uploads
    pub transcoder: Transcoder,
}

impl AppState {
    /// Create a new application state
    pub fn new(
        config: Config,
        guard: AuthGuard,
        pairing: PairingManager,
        queue: MessageQueue,
        blobs: BlobStore,
        transcoder: Transcoder,
    ) -> Self {
        Self {
            config,
            guard,
            pairing,
            queue,
            blobs,
            transcoder,
        }
    }
}

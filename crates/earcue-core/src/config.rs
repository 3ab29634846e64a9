//! Configuration types for Earcue

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main configuration for Earcue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// SQLite database file
    pub db_path: PathBuf,
    /// Directory holding converted audio blobs
    pub blob_dir: PathBuf,
    /// Bearer token for operator endpoints
    pub admin_token: String,
    /// ffmpeg binary name or path
    pub ffmpeg_path: String,
    /// Message time-to-live when the enqueue request does not set one
    pub default_ttl_seconds: i64,
    /// Lifetime of an unredeemed pairing code
    pub pairing_code_ttl_seconds: i64,
    /// Long-poll wait when the request does not set one
    pub default_poll_timeout_seconds: u64,
    /// How often the background sweep reclaims expired queued messages
    pub sweep_interval_seconds: u64,
}

/// Placeholder admin token shipped for local development
pub const DEV_ADMIN_TOKEN: &str = "dev-admin-token-change-me";

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            db_path: PathBuf::from("/data/app.db"),
            blob_dir: PathBuf::from("/data/blobs"),
            admin_token: DEV_ADMIN_TOKEN.to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            default_ttl_seconds: 600,
            pairing_code_ttl_seconds: 300,
            default_poll_timeout_seconds: 45,
            sweep_interval_seconds: 60,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder pattern: set database path
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Builder pattern: set blob directory
    pub fn with_blob_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.blob_dir = dir.into();
        self
    }

    /// Builder pattern: set admin token
    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = token.into();
        self
    }

    /// Builder pattern: set ffmpeg path
    pub fn with_ffmpeg_path(mut self, path: impl Into<String>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    /// Builder pattern: set default message TTL
    pub fn with_default_ttl_seconds(mut self, seconds: i64) -> Self {
        self.default_ttl_seconds = seconds;
        self
    }

    /// Builder pattern: set pairing code TTL
    pub fn with_pairing_code_ttl_seconds(mut self, seconds: i64) -> Self {
        self.pairing_code_ttl_seconds = seconds;
        self
    }

    /// Builder pattern: set default long-poll timeout
    pub fn with_default_poll_timeout_seconds(mut self, seconds: u64) -> Self {
        self.default_poll_timeout_seconds = seconds;
        self
    }

    /// Builder pattern: set the background sweep interval
    pub fn with_sweep_interval_seconds(mut self, seconds: u64) -> Self {
        self.sweep_interval_seconds = seconds;
        self
    }

    /// True while the shipped development admin token is still in place
    pub fn uses_dev_admin_token(&self) -> bool {
        self.admin_token == DEV_ADMIN_TOKEN
    }
}

//! Converted audio blob storage.

use std::path::PathBuf;

use earcue_core::{Error, Result};
use earcue_store::Database;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Result of storing one converted upload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBlob {
    pub audio_blob_key: String,
    pub content_type: String,
    pub size_bytes: i64,
}

/// Stores converted WAV files on disk with their index rows
///
/// Blobs are immutable: written once under a fresh key and never rewritten.
pub struct BlobStore {
    db: Database,
    blob_dir: PathBuf,
}

impl BlobStore {
    pub fn new(db: Database, blob_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            blob_dir: blob_dir.into(),
        }
    }

    /// Ensure the blob directory exists
    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.blob_dir).await?;
        Ok(())
    }

    /// Persist converted WAV bytes under a fresh key
    pub async fn store_wav(&self, wav: &[u8]) -> Result<StoredBlob> {
        let blob_key = format!("b_{}", Uuid::new_v4().simple());
        let file_path = self.blob_dir.join(format!("{blob_key}.wav"));

        tokio::fs::write(&file_path, wav).await?;

        let blob = self
            .db
            .create_audio_blob(
                &blob_key,
                "audio/wav",
                wav.len() as i64,
                &file_path.to_string_lossy(),
            )
            .await?;

        info!(blob_key = %blob.blob_key, size_bytes = blob.size_bytes, "Audio blob stored");

        Ok(StoredBlob {
            audio_blob_key: blob.blob_key,
            content_type: blob.content_type,
            size_bytes: blob.size_bytes,
        })
    }

    /// Read a blob back for serving, as (content type, bytes)
    ///
    /// A missing index row and a missing backing file both surface as
    /// not-found.
    pub async fn read(&self, blob_key: &str) -> Result<(String, Vec<u8>)> {
        let blob = self.db.get_audio_blob(blob_key).await?;

        let bytes = match tokio::fs::read(&blob.file_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(blob_key = %blob_key, "Blob row exists but backing file is gone");
                return Err(Error::not_found("Blob file"));
            }
            Err(e) => return Err(e.into()),
        };

        Ok((blob.content_type, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn test_store() -> (BlobStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open_in_memory().await.unwrap();
        let store = BlobStore::new(db, dir.path());
        store.init().await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn store_and_read_round_trip() {
        let (store, _dir) = test_store().await;

        let payload = b"RIFF....WAVE fake payload";
        let stored = store.store_wav(payload).await.unwrap();

        assert!(stored.audio_blob_key.starts_with("b_"));
        assert_eq!(stored.audio_blob_key.len(), 34);
        assert_eq!(stored.content_type, "audio/wav");
        assert_eq!(stored.size_bytes, payload.len() as i64);

        let (content_type, bytes) = store.read(&stored.audio_blob_key).await.unwrap();
        assert_eq!(content_type, "audio/wav");
        assert_eq!(bytes, payload);
    }

    #[tokio::test]
    async fn read_unknown_key() {
        let (store, _dir) = test_store().await;

        let result = store.read("b_nope").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn read_with_missing_file() {
        let (store, dir) = test_store().await;

        let stored = store.store_wav(b"bytes").await.unwrap();
        let path = dir.path().join(format!("{}.wav", stored.audio_blob_key));
        tokio::fs::remove_file(path).await.unwrap();

        let result = store.read(&stored.audio_blob_key).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}

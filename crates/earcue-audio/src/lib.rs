//! Earcue Audio - ffmpeg-backed normalization and blob storage
//!
//! Uploaded clips arrive in whatever container the operator's browser
//! recorded; everything is normalized to PCM s16le 48 kHz stereo WAV before
//! it is stored, so devices only ever see one format.

pub mod blobs;
pub mod transcode;

pub use blobs::{BlobStore, StoredBlob};
pub use transcode::{extension_hint, is_wav, Transcoder};

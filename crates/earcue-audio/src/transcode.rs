//! Audio normalization through ffmpeg.

use earcue_core::{Error, Result};
use tokio::process::Command;

/// How much of ffmpeg's stderr to carry into an error message
const STDERR_EXCERPT_CHARS: usize = 1200;

/// Converts arbitrary input audio to PCM s16le 48 kHz stereo WAV
///
/// ffmpeg is treated as a pure bytes-to-bytes function: input and output go
/// through a scratch directory that is dropped afterwards, and any failure
/// leaves nothing behind.
pub struct Transcoder {
    ffmpeg_path: String,
}

impl Transcoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// True when the configured ffmpeg binary runs
    pub async fn is_available(&self) -> bool {
        match Command::new(&self.ffmpeg_path)
            .arg("-version")
            .output()
            .await
        {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }

    /// Convert input bytes to WAV
    ///
    /// `ext_hint` names the input file for ffmpeg's container probing, e.g.
    /// ".webm". The output is checked for RIFF/WAVE framing before it is
    /// accepted.
    pub async fn to_wav(&self, input: &[u8], ext_hint: &str) -> Result<Vec<u8>> {
        let dir = tempfile::tempdir()?;
        let input_path = dir.path().join(format!("in{ext_hint}"));
        let output_path = dir.path().join("out.wav");

        tokio::fs::write(&input_path, input).await?;

        let output = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(&input_path)
            .arg("-vn")
            .arg("-ac")
            .arg("2")
            .arg("-ar")
            .arg("48000")
            .arg("-c:a")
            .arg("pcm_s16le")
            .arg("-f")
            .arg("wav")
            .arg(&output_path)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ConversionFailed(excerpt(&stderr)));
        }

        let wav = tokio::fs::read(&output_path)
            .await
            .map_err(|_| Error::ConversionFailed("ffmpeg produced no output".into()))?;

        if !is_wav(&wav) {
            return Err(Error::ConversionFailed(
                "output is missing the RIFF/WAVE header".into(),
            ));
        }

        Ok(wav)
    }
}

/// RIFF/WAVE container check
pub fn is_wav(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE"
}

/// Pick an input extension hint from the upload metadata
///
/// Prefers the uploaded filename's suffix when it looks sane, then falls
/// back to a content-type mapping, then ".bin". ffmpeg sniffs most
/// containers itself; the hint only helps ambiguous ones.
pub fn extension_hint(filename: Option<&str>, content_type: Option<&str>) -> String {
    if let Some(name) = filename {
        if let Some(idx) = name.rfind('.') {
            let ext = &name[idx..];
            if idx > 0 && ext.len() > 1 && ext.len() <= 8 {
                return ext.to_lowercase();
            }
        }
    }

    match content_type {
        Some("audio/webm") => ".webm".to_string(),
        Some("audio/wav") | Some("audio/x-wav") => ".wav".to_string(),
        Some("audio/mpeg") => ".mp3".to_string(),
        Some("audio/ogg") => ".ogg".to_string(),
        _ => ".bin".to_string(),
    }
}

fn excerpt(s: &str) -> String {
    s.chars().take(STDERR_EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal valid WAV: 8 kHz mono s16le, four samples of silence.
    fn tiny_wav() -> Vec<u8> {
        let mut wav = Vec::new();
        let data: [u8; 8] = [0; 8];

        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36u32 + data.len() as u32).to_le_bytes());
        wav.extend_from_slice(b"WAVE");

        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes()); // chunk size
        wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
        wav.extend_from_slice(&1u16.to_le_bytes()); // mono
        wav.extend_from_slice(&8000u32.to_le_bytes()); // sample rate
        wav.extend_from_slice(&16000u32.to_le_bytes()); // byte rate
        wav.extend_from_slice(&2u16.to_le_bytes()); // block align
        wav.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&(data.len() as u32).to_le_bytes());
        wav.extend_from_slice(&data);
        wav
    }

    #[test]
    fn wav_header_check() {
        assert!(is_wav(&tiny_wav()));
        assert!(!is_wav(b"RIFF"));
        assert!(!is_wav(b"OggS\x00\x00\x00\x00\x00\x00\x00\x00"));
        assert!(!is_wav(b""));
    }

    #[test]
    fn extension_hint_prefers_filename() {
        assert_eq!(extension_hint(Some("clip.WebM"), None), ".webm");
        assert_eq!(extension_hint(Some("clip.mp3"), Some("audio/ogg")), ".mp3");
    }

    #[test]
    fn extension_hint_falls_back_to_content_type() {
        assert_eq!(extension_hint(None, Some("audio/webm")), ".webm");
        assert_eq!(extension_hint(None, Some("audio/x-wav")), ".wav");
        assert_eq!(extension_hint(None, Some("audio/mpeg")), ".mp3");
        assert_eq!(extension_hint(Some("noext"), Some("audio/ogg")), ".ogg");
        assert_eq!(extension_hint(None, None), ".bin");
        assert_eq!(extension_hint(Some("blob"), Some("video/mp4")), ".bin");
    }

    #[test]
    fn extension_hint_rejects_odd_suffixes() {
        // Overlong suffix, bare dot, and dotfile all fall through.
        assert_eq!(extension_hint(Some("x.verylongext"), None), ".bin");
        assert_eq!(extension_hint(Some("trailing."), None), ".bin");
        assert_eq!(extension_hint(Some(".hidden"), None), ".bin");
    }

    #[tokio::test]
    async fn transcode_yields_valid_wav() {
        let transcoder = Transcoder::new("ffmpeg");
        if !transcoder.is_available().await {
            eprintln!("ffmpeg not available, skipping");
            return;
        }

        let wav = transcoder.to_wav(&tiny_wav(), ".wav").await.unwrap();
        assert!(is_wav(&wav));
        // Output is larger than the input: stereo at 48 kHz.
        assert!(wav.len() > tiny_wav().len());
    }

    #[tokio::test]
    async fn transcode_rejects_garbage() {
        let transcoder = Transcoder::new("ffmpeg");
        if !transcoder.is_available().await {
            eprintln!("ffmpeg not available, skipping");
            return;
        }

        let result = transcoder.to_wav(b"definitely not audio", ".bin").await;
        assert!(matches!(result, Err(Error::ConversionFailed(_))));
    }
}

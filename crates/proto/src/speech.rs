//! Speech-to-text boundary.

use async_trait::async_trait;

use crate::error::SpeechError;

/// Normalized audio ready for transcription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    /// Audio bytes.
    pub bytes: Vec<u8>,
    /// File name presented to the transcription API (drives format sniffing).
    pub file_name: String,
    /// MIME type matching `file_name`.
    pub mime_type: String,
}

/// Converts spoken audio into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribes `clip` using `language` as a hint (ISO-639-1, may be empty).
    async fn transcribe(&self, clip: AudioClip, language: &str) -> Result<String, SpeechError>;
}

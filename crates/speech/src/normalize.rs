//! Turns a downloaded voice note into an [`AudioClip`] the transcription API
//! accepts.
//!
//! Telegram voice notes are Opus in an Ogg container stored as `.oga`, which
//! the OpenAI endpoint only recognizes under an `.ogg` name. Other formats keep
//! their extension and get a matching MIME type.

use proto::{AudioClip, SpeechError, VoiceFile};

const OGG_MAGIC: &[u8] = b"OggS";

/// Extensions the transcription endpoint accepts, with their MIME types.
const KNOWN_FORMATS: &[(&str, &str)] = &[
    ("ogg", "audio/ogg"),
    ("mp3", "audio/mpeg"),
    ("mpeg", "audio/mpeg"),
    ("mpga", "audio/mpeg"),
    ("m4a", "audio/mp4"),
    ("mp4", "audio/mp4"),
    ("wav", "audio/wav"),
    ("webm", "audio/webm"),
    ("flac", "audio/flac"),
];

/// Normalizes a downloaded voice file.
pub fn normalize_voice(file: VoiceFile) -> Result<AudioClip, SpeechError> {
    if file.bytes.is_empty() {
        return Err(SpeechError::EmptyAudio);
    }

    let extension = file_extension(&file.file_path);
    let mime = file
        .mime_type
        .as_deref()
        .map(|m| m.trim().to_lowercase())
        .unwrap_or_default();

    if file.bytes.starts_with(OGG_MAGIC)
        || matches!(extension.as_deref(), Some("oga" | "ogg" | "opus"))
        || mime == "audio/ogg"
        || mime == "audio/opus"
    {
        return Ok(AudioClip {
            bytes: file.bytes,
            file_name: "voice.ogg".to_string(),
            mime_type: "audio/ogg".to_string(),
        });
    }

    if let Some(ext) = extension.as_deref()
        && let Some((ext, mime_type)) = KNOWN_FORMATS.iter().find(|(known, _)| *known == ext)
    {
        return Ok(AudioClip {
            bytes: file.bytes,
            file_name: format!("voice.{ext}"),
            mime_type: (*mime_type).to_string(),
        });
    }

    if let Some((ext, mime_type)) = KNOWN_FORMATS.iter().find(|(_, known)| *known == mime) {
        return Ok(AudioClip {
            bytes: file.bytes,
            file_name: format!("voice.{ext}"),
            mime_type: (*mime_type).to_string(),
        });
    }

    let label = if !mime.is_empty() {
        mime
    } else {
        extension.unwrap_or_else(|| file.file_path.clone())
    };
    Err(SpeechError::UnsupportedFormat(label))
}

/// Lowercased extension of the last path segment.
fn file_extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_lowercase())
    }
}

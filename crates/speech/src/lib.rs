//! Voice-note normalization and speech-to-text providers.

pub mod normalize;
pub mod openai;

/// Voice-note normalization.
pub use normalize::normalize_voice;
/// OpenAI transcription client.
pub use openai::OpenAiTranscriber;

//! OpenAI speech-to-text provider.

use std::time::Duration;

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{AudioInput, CreateTranscriptionRequestArgs},
};
use async_trait::async_trait;
use proto::{AudioClip, SpeechError, Transcriber};
use tracing::{debug, error};

/// Default transcription model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini-transcribe";

/// Transcriber backed by the OpenAI audio API.
pub struct OpenAiTranscriber {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAiTranscriber {
    /// Creates a transcriber using the default API base URL.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self::with_config(config, model, timeout)
    }

    /// Creates a transcriber with a custom API base URL.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        Self::with_config(config, model, timeout)
    }

    fn with_config(config: OpenAIConfig, model: impl Into<String>, timeout: Duration) -> Self {
        let model = model.into();
        Self {
            client: Client::with_config(config),
            model: effective_model(&model).to_string(),
            timeout,
        }
    }

    /// Returns the configured model id.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, clip: AudioClip, language: &str) -> Result<String, SpeechError> {
        if clip.bytes.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }

        let mut builder = CreateTranscriptionRequestArgs::default();
        builder
            .file(AudioInput::from_vec_u8(clip.file_name.clone(), clip.bytes))
            .model(&self.model);
        let language = language.trim();
        if !language.is_empty() {
            builder.language(language);
        }
        let request = builder
            .build()
            .map_err(|e| SpeechError::Api(e.to_string()))?;

        debug!(
            model = %self.model,
            file_name = %clip.file_name,
            language = %language,
            "Sending transcription request"
        );

        let response = tokio::time::timeout(self.timeout, self.client.audio().transcribe(request))
            .await
            .map_err(|_| SpeechError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| {
                error!(error = %e, "OpenAI transcription failed");
                SpeechError::Api(e.to_string())
            })?;

        extract_text(&response.text)
    }
}

/// Falls back to [`DEFAULT_MODEL`] for blank model ids.
fn effective_model(model: &str) -> &str {
    let trimmed = model.trim();
    if trimmed.is_empty() {
        DEFAULT_MODEL
    } else {
        trimmed
    }
}

/// Rejects blank transcription output.
fn extract_text(text: &str) -> Result<String, SpeechError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(SpeechError::EmptyResult)
    } else {
        Ok(trimmed.to_string())
    }
}

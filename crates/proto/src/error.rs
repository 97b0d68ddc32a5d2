use thiserror::Error;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration loading/validation error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Approval registry error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Approval submission error.
    #[error("Submit error: {0}")]
    Submit(#[from] SubmitError),

    /// Chat channel error.
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Speech-to-text error.
    #[error("Speech error: {0}")]
    Speech(#[from] SpeechError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field was not provided.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A field has an invalid value and reason.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Filesystem read error.
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    Toml(String),
}

/// Approval registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The correlation id is already in flight.
    #[error("Approval already exists: {0}")]
    AlreadyExists(String),
}

/// Errors returned synchronously to the submitter
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The request failed validation.
    #[error("{0}")]
    Invalid(String),

    /// The correlation id is already in flight.
    #[error("approval already exists: {0}")]
    AlreadyExists(String),

    /// The reviewer could not be notified.
    #[error("failed to send telegram message: {0}")]
    Notification(#[source] ChannelError),
}

impl From<RegistryError> for SubmitError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AlreadyExists(id) => Self::AlreadyExists(id),
        }
    }
}

/// Chat channel errors
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Channel connection or update polling failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Sending a message failed.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Editing a message failed.
    #[error("Edit failed: {0}")]
    EditFailed(String),

    /// Deleting a message failed.
    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    /// Downloading a file failed.
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// Channel has been closed.
    #[error("Channel closed")]
    Closed,
}

/// Speech-to-text errors
#[derive(Debug, Error)]
pub enum SpeechError {
    /// No transcriber configured.
    #[error("Transcription disabled")]
    Disabled,

    /// Audio payload was empty.
    #[error("Empty audio")]
    EmptyAudio,

    /// Audio container could not be recognized.
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Transcription exceeded its time budget.
    #[error("Timeout after {0}s")]
    Timeout(u64),

    /// Remote API failure.
    #[error("{0}")]
    Api(String),

    /// API returned no text.
    #[error("Empty transcription result")]
    EmptyResult,
}

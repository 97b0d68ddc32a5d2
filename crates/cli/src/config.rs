use proto::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const ENV_PREFIX: &str = "TG_APPROVER_";

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_approval_timeout() -> u64 {
    3600
}

fn default_shutdown_timeout() -> u64 {
    10
}

fn default_callback_timeout() -> u64 {
    10
}

fn default_stt_model() -> String {
    speech::openai::DEFAULT_MODEL.to_string()
}

fn default_stt_timeout() -> u64 {
    30
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Bot credentials and update delivery.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// HTTP listener.
    #[serde(default)]
    pub http: HttpConfig,

    /// Approval policy.
    #[serde(default)]
    pub approval: ApprovalConfig,

    /// Voice transcription.
    #[serde(default)]
    pub speech: SpeechConfig,
}

/// Telegram bot settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token.
    #[serde(default)]
    pub token: String,
    /// The single chat allowed to review requests.
    #[serde(default)]
    pub chat_id: i64,
    /// Public URL Telegram pushes updates to. Enables webhook mode with `webhook_secret`.
    #[serde(default)]
    pub webhook_url: String,
    /// Secret Telegram echoes in `X-Telegram-Bot-Api-Secret-Token`.
    #[serde(default)]
    pub webhook_secret: String,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_addr")]
    pub addr: String,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
    /// Budget for one decision webhook POST.
    #[serde(default = "default_callback_timeout")]
    pub callback_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            callback_timeout_secs: default_callback_timeout(),
        }
    }
}

/// Approval policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Default display language (`en`, `ru`).
    #[serde(default = "default_lang")]
    pub lang: String,
    /// Wait for a decision before reporting a timeout.
    #[serde(default = "default_approval_timeout")]
    pub timeout_secs: u64,
    /// Replaces the localized timeout note in chat.
    #[serde(default)]
    pub timeout_message: String,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            lang: default_lang(),
            timeout_secs: default_approval_timeout(),
            timeout_message: String::new(),
        }
    }
}

/// Speech-to-text settings. Voice replies are disabled without an API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default = "default_stt_model")]
    pub model: String,
    #[serde(default = "default_stt_timeout")]
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            model: default_stt_model(),
            timeout_secs: default_stt_timeout(),
        }
    }
}

impl Config {
    /// Loads configuration from explicit path, fallback locations, and env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = path.map(|p| p.to_path_buf()).or_else(|| {
            let cwd = std::env::current_dir().ok()?.join("config.toml");
            if cwd.exists() {
                return Some(cwd);
            }
            let home_config = Self::home_dir()?.join("config.toml");
            home_config.exists().then_some(home_config)
        });
        debug!(path = ?config_path, "Config file resolved");

        let mut config = if let Some(path) = config_path {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content).map_err(|e| ConfigError::Toml(e.to_string()))?
        } else {
            Config::default()
        };

        config.apply_env()?;
        config.validate()?;
        debug!(
            chat_id = config.telegram.chat_id,
            mode = config.update_mode(),
            lang = %config.approval.lang,
            "Config loaded"
        );
        Ok(config)
    }

    /// `~/.telegram-approver`, if `HOME` is set.
    pub fn home_dir() -> Option<PathBuf> {
        let home = std::env::var("HOME").ok()?;
        Some(PathBuf::from(home).join(".telegram-approver"))
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(token) = env("TOKEN") {
            self.telegram.token = token;
        }
        if let Some(chat_id) = env("CHAT_ID") {
            self.telegram.chat_id =
                chat_id
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        field: "chat_id".to_string(),
                        reason: format!("'{chat_id}' is not an integer"),
                    })?;
        }
        if let Some(addr) = env("HTTP_ADDR") {
            self.http.addr = normalize_addr(&addr);
        }
        if let Some(lang) = env("LANG") {
            self.approval.lang = lang;
        }
        if let Some(timeout) = env("APPROVAL_TIMEOUT") {
            self.approval.timeout_secs = parse_secs("approval_timeout", &timeout)?;
        }
        if let Some(message) = env("TIMEOUT_MESSAGE") {
            self.approval.timeout_message = message;
        }
        if let Some(url) = env("WEBHOOK_URL") {
            self.telegram.webhook_url = url;
        }
        if let Some(secret) = env("WEBHOOK_SECRET") {
            self.telegram.webhook_secret = secret;
        }
        if let Some(key) = env("OPENAI_API_KEY") {
            self.speech.openai_api_key = key;
        }
        if let Some(model) = env("STT_MODEL") {
            self.speech.model = model;
        }
        if let Some(timeout) = env("STT_TIMEOUT") {
            self.speech.timeout_secs = parse_secs("stt_timeout", &timeout)?;
        }
        if let Some(timeout) = env("SHUTDOWN_TIMEOUT") {
            self.http.shutdown_timeout_secs = parse_secs("shutdown_timeout", &timeout)?;
        }
        if let Some(timeout) = env("CALLBACK_TIMEOUT") {
            self.http.callback_timeout_secs = parse_secs("callback_timeout", &timeout)?;
        }
        Ok(())
    }

    /// Checks required fields and normalizes the language.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.telegram.token.trim().is_empty() {
            return Err(ConfigError::MissingField("telegram.token".to_string()));
        }
        if self.telegram.chat_id == 0 {
            return Err(ConfigError::MissingField("telegram.chat_id".to_string()));
        }
        if self.approval.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "approval.timeout_secs".to_string(),
                reason: "approval timeout must be positive".to_string(),
            });
        }
        if self.telegram.webhook_url.trim().is_empty()
            != self.telegram.webhook_secret.trim().is_empty()
        {
            return Err(ConfigError::InvalidValue {
                field: "telegram.webhook_url".to_string(),
                reason: "webhook url and secret must be set together".to_string(),
            });
        }
        self.approval.lang = self.approval.lang.trim().to_lowercase();
        if self.approval.lang.is_empty() {
            self.approval.lang = default_lang();
        }
        if self.speech.model.trim().is_empty() {
            self.speech.model = default_stt_model();
        }
        Ok(())
    }

    /// Webhook mode requires both the URL and the secret.
    pub fn webhook_enabled(&self) -> bool {
        !self.telegram.webhook_url.trim().is_empty()
            && !self.telegram.webhook_secret.trim().is_empty()
    }

    pub fn update_mode(&self) -> &'static str {
        if self.webhook_enabled() {
            "webhook"
        } else {
            "long-polling"
        }
    }

    pub fn voice_enabled(&self) -> bool {
        !self.speech.openai_api_key.trim().is_empty()
    }

    pub fn approval_timeout(&self) -> Duration {
        Duration::from_secs(self.approval.timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.http.shutdown_timeout_secs)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.http.callback_timeout_secs)
    }

    pub fn stt_timeout(&self) -> Duration {
        Duration::from_secs(self.speech.timeout_secs)
    }

    /// Human-readable summary with secrets masked.
    pub fn summary(&self) -> String {
        [
            format!("token:            {}", mask(&self.telegram.token)),
            format!("chat_id:          {}", self.telegram.chat_id),
            format!("updates:          {}", self.update_mode()),
            format!("webhook_url:      {}", self.telegram.webhook_url),
            format!("webhook_secret:   {}", mask(&self.telegram.webhook_secret)),
            format!("http_addr:        {}", self.http.addr),
            format!("lang:             {}", self.approval.lang),
            format!("approval_timeout: {}s", self.approval.timeout_secs),
            format!(
                "voice:            {}",
                if self.voice_enabled() {
                    format!("enabled ({})", self.speech.model)
                } else {
                    "disabled".to_string()
                }
            ),
        ]
        .join("\n")
    }
}

fn env(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}")).ok()
}

/// Accepts `:8080` shorthand for all interfaces.
fn normalize_addr(addr: &str) -> String {
    let addr = addr.trim();
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

/// Parses `90` as seconds, or a humantime duration such as `30s`, `15m`, `1h 30m`.
fn parse_secs(field: &str, raw: &str) -> Result<u64, ConfigError> {
    let value = raw.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Ok(secs);
    }
    humantime::parse_duration(value)
        .map(|d| d.as_secs())
        .map_err(|e| ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("'{raw}' is not a duration: {e}"),
        })
}

fn mask(secret: &str) -> String {
    match secret.chars().count() {
        0 => "(unset)".to_string(),
        n if n <= 8 => "****".to_string(),
        _ => {
            let tail: String = secret.chars().skip(secret.chars().count() - 4).collect();
            format!("****{tail}")
        }
    }
}

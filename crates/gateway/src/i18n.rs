//! Localized strings for reviewer-facing text.
//!
//! Bundles are YAML files embedded at build time. Lookups fall back from the
//! requested language to the configured default and finally to English.

use std::collections::HashMap;

use proto::ConfigError;
use serde::Deserialize;

const FALLBACK_LANG: &str = "en";

const BUNDLES: &[(&str, &str)] = &[
    ("en", include_str!("../locales/en.yaml")),
    ("ru", include_str!("../locales/ru.yaml")),
];

/// Localized strings for one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Messages {
    pub approval_title: String,
    pub approval_correlation: String,
    pub approval_tool: String,
    pub approval_action: String,
    pub approval_justification: String,
    pub approval_risk: String,
    pub approval_params: String,
    pub approval_links: String,
    pub approve_button: String,
    pub deny_button: String,
    pub deny_with_message_button: String,
    pub cancel_deny_button: String,
    pub delete_button: String,
    pub deny_prompt: String,
    pub approved_note: String,
    pub denied_note: String,
    pub timeout_note: String,
    pub error_note: String,
    pub invalid_action: String,
    pub already_resolved: String,
    pub invalid_chat: String,
    pub voice_disabled: String,
    pub transcription_failed: String,
}

/// All loaded bundles plus the default language.
#[derive(Debug, Clone)]
pub struct Catalog {
    default_lang: String,
    bundles: HashMap<String, Messages>,
}

impl Catalog {
    /// Parses the embedded bundles. Unknown default languages fall back to English.
    pub fn load(default_lang: &str) -> Result<Self, ConfigError> {
        let mut bundles = HashMap::new();
        for (lang, source) in BUNDLES {
            let messages: Messages =
                serde_yaml::from_str(source).map_err(|e| ConfigError::InvalidValue {
                    field: format!("locale {lang}"),
                    reason: e.to_string(),
                })?;
            bundles.insert((*lang).to_string(), messages);
        }

        let mut default_lang = normalize_lang(default_lang);
        if !bundles.contains_key(&default_lang) {
            default_lang = FALLBACK_LANG.to_string();
        }
        Ok(Self {
            default_lang,
            bundles,
        })
    }

    /// Effective default language.
    pub fn default_lang(&self) -> &str {
        &self.default_lang
    }

    /// Returns `true` when a bundle exists for `lang`.
    pub fn supports(&self, lang: &str) -> bool {
        self.bundles.contains_key(&normalize_lang(lang))
    }

    /// Strings for `lang`, falling back to the default and then English.
    pub fn messages(&self, lang: &str) -> &Messages {
        let lang = normalize_lang(lang);
        self.bundles
            .get(&lang)
            .or_else(|| self.bundles.get(&self.default_lang))
            .or_else(|| self.bundles.get(FALLBACK_LANG))
            .unwrap_or_else(|| empty_messages())
    }
}

fn empty_messages() -> &'static Messages {
    static EMPTY: std::sync::OnceLock<Messages> = std::sync::OnceLock::new();
    EMPTY.get_or_init(Messages::default)
}

/// Lowercases and trims a language code.
pub fn normalize_lang(lang: &str) -> String {
    lang.trim().to_lowercase()
}

use std::env;
use std::path::PathBuf;

use tracing::warn;

use crate::i18n::Language;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// Checked at call time; `None` makes every gateway call a configuration error.
    pub api_key: Option<String>,
    pub api_base: String,
    pub text_model: String,
    pub image_model: String,
    pub port: u16,
    pub default_language: Language,
    /// Sessions untouched for longer than this are dropped by the sweeper.
    pub session_idle_ttl: chrono::Duration,
    /// TTF with CJK coverage for guide PDFs.
    pub guide_font_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            port: 8080,
            default_language: Language::Zh,
            session_idle_ttl: chrono::Duration::minutes(DEFAULT_SESSION_TTL_MINUTES),
            guide_font_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_blank = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = non_blank("GEMINI_API_KEY");
        if api_key.is_none() {
            warn!("GEMINI_API_KEY is not set; every model request will be refused");
        }

        let port = match non_blank("PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("Invalid PORT '{}', using {}", raw, defaults.port);
                defaults.port
            }),
            None => defaults.port,
        };

        let default_language = match non_blank("DEFAULT_LANGUAGE") {
            Some(raw) => Language::from_code(&raw).unwrap_or_else(|| {
                warn!("Unknown DEFAULT_LANGUAGE '{}', using {}", raw, defaults.default_language.code());
                defaults.default_language
            }),
            None => defaults.default_language,
        };

        let session_idle_ttl = match non_blank("SESSION_TTL_MINUTES") {
            Some(raw) => match raw.parse::<i64>() {
                Ok(minutes) if minutes > 0 => chrono::Duration::minutes(minutes),
                _ => {
                    warn!("Invalid SESSION_TTL_MINUTES '{}', using {}", raw, DEFAULT_SESSION_TTL_MINUTES);
                    defaults.session_idle_ttl
                }
            },
            None => defaults.session_idle_ttl,
        };

        Self {
            api_key,
            api_base: non_blank("GEMINI_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            text_model: non_blank("GEMINI_TEXT_MODEL").unwrap_or(defaults.text_model),
            image_model: non_blank("GEMINI_IMAGE_MODEL").unwrap_or(defaults.image_model),
            port,
            default_language,
            session_idle_ttl,
            guide_font_path: non_blank("GUIDE_FONT_PATH").map(PathBuf::from),
        }
    }
}

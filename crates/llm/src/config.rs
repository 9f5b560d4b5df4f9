use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 6_000;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini,
    OpenAi,
}

impl LlmProvider {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "gemini" | "google" => Some(Self::Gemini),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Self::Gemini => DEFAULT_GEMINI_BASE_URL,
            Self::OpenAi => DEFAULT_OPENAI_BASE_URL,
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => DEFAULT_GEMINI_MODEL,
            Self::OpenAi => DEFAULT_OPENAI_MODEL,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LlmConfigError {
    #[error("no llm credential: set CAMPUS_LLM_API_KEY or API_KEY")]
    MissingCredential,
    #[error("invalid {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

#[derive(Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl LlmConfig {
    pub fn new(provider: LlmProvider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            model: provider.default_model().to_string(),
            base_url: provider.default_base_url().to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }

    pub fn from_env() -> Result<Self, LlmConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LlmConfigError> {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let provider = match read("CAMPUS_LLM_PROVIDER") {
            Some(value) => LlmProvider::parse(&value).ok_or_else(|| LlmConfigError::InvalidValue {
                name: "CAMPUS_LLM_PROVIDER",
                reason: format!("unknown provider {value}"),
            })?,
            None => LlmProvider::Gemini,
        };

        let api_key = read("CAMPUS_LLM_API_KEY")
            .or_else(|| read("API_KEY"))
            .ok_or(LlmConfigError::MissingCredential)?;

        let mut config = Self::new(provider, api_key);

        if let Some(model) = read("CAMPUS_LLM_MODEL") {
            config.model = model;
        }
        if let Some(base_url) = read("CAMPUS_LLM_BASE_URL") {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(LlmConfigError::InvalidValue {
                    name: "CAMPUS_LLM_BASE_URL",
                    reason: "must start with http:// or https://".to_string(),
                });
            }
            config.base_url = base_url;
        }
        if let Some(timeout) = read("CAMPUS_LLM_TIMEOUT_MS") {
            config.timeout = parse_millis("CAMPUS_LLM_TIMEOUT_MS", &timeout)?;
        }
        if let Some(timeout) = read("CAMPUS_LLM_CONNECT_TIMEOUT_MS") {
            config.connect_timeout = parse_millis("CAMPUS_LLM_CONNECT_TIMEOUT_MS", &timeout)?;
        }

        Ok(config)
    }
}

fn parse_millis(name: &'static str, value: &str) -> Result<Duration, LlmConfigError> {
    match value.parse::<u64>() {
        Ok(0) => Err(LlmConfigError::InvalidValue {
            name,
            reason: "must be greater than zero".to_string(),
        }),
        Ok(millis) => Ok(Duration::from_millis(millis)),
        Err(err) => Err(LlmConfigError::InvalidValue {
            name,
            reason: err.to_string(),
        }),
    }
}

mod config;
mod gemini;
mod openai;
mod session;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use config::{LlmConfig, LlmConfigError, LlmProvider};
pub use gemini::GeminiChatModel;
pub use openai::OpenAiChatModel;
pub use session::{ConversationSession, SessionPurpose};

const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// One completion request: the whole transcript, ending with the new user turn.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub purpose: SessionPurpose,
    pub turns: &'a [Turn],
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm request timed out")]
    Timeout,
    #[error("llm request failed: {0}")]
    Transport(String),
    #[error("llm provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("llm provider returned an invalid payload: {0}")]
    InvalidPayload(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }
}

pub type ChatFuture<'a> = Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>>;

pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;
    fn complete<'a>(&'a self, request: ChatRequest<'a>) -> ChatFuture<'a>;
}

pub fn build_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>, LlmError> {
    let model: Arc<dyn ChatModel> = match config.provider {
        LlmProvider::Gemini => Arc::new(GeminiChatModel::new(config)?),
        LlmProvider::OpenAi => Arc::new(OpenAiChatModel::new(config)?),
    };
    Ok(model)
}

pub(crate) fn http_client(config: &LlmConfig) -> Result<Client, LlmError> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.timeout)
        .build()
        .map_err(|err| LlmError::Transport(format!("failed to build HTTP client: {err}")))
}

/// Reads the body of a non-success response into an [`LlmError::Status`].
pub(crate) async fn status_error(response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let body = if body.chars().count() > MAX_ERROR_BODY_CHARS {
        body.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>() + "..."
    } else {
        body
    };
    LlmError::Status { status, body }
}

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::{
    http_client, status_error, ChatFuture, ChatModel, ChatRequest, LlmConfig, LlmError, Role, Turn,
};

/// Chat model backed by the Gemini `generateContent` endpoint.
pub struct GeminiChatModel {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GeminiChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client(config)?,
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                config.base_url.trim_end_matches('/'),
                config.model
            ),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    async fn generate(&self, request: ChatRequest<'_>) -> Result<String, LlmError> {
        let payload = request_payload(request.turns);
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| LlmError::InvalidPayload(err.to_string()))?;
        let reply = extract_reply(&body)?;

        debug!(
            purpose = request.purpose.as_str(),
            reply_chars = reply.chars().count(),
            "gemini reply received"
        );
        Ok(reply)
    }
}

impl ChatModel for GeminiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn complete<'a>(&'a self, request: ChatRequest<'a>) -> ChatFuture<'a> {
        Box::pin(self.generate(request))
    }
}

fn request_payload(turns: &[Turn]) -> Value {
    let contents = turns
        .iter()
        .map(|turn| {
            let role = match turn.role {
                Role::User => "user",
                Role::Model => "model",
            };
            serde_json::json!({
                "role": role,
                "parts": [{ "text": turn.text }]
            })
        })
        .collect::<Vec<_>>();

    serde_json::json!({ "contents": contents })
}

fn extract_reply(payload: &Value) -> Result<String, LlmError> {
    if let Some(reason) = payload
        .pointer("/promptFeedback/blockReason")
        .and_then(|value| value.as_str())
    {
        return Err(LlmError::InvalidPayload(format!("prompt blocked: {reason}")));
    }

    let candidate = payload
        .get("candidates")
        .and_then(|value| value.as_array())
        .and_then(|candidates| candidates.first())
        .ok_or_else(|| LlmError::InvalidPayload("response has no candidates".to_string()))?;

    let parts = candidate
        .pointer("/content/parts")
        .and_then(|value| value.as_array())
        .ok_or_else(|| {
            let reason = candidate
                .get("finishReason")
                .and_then(|value| value.as_str())
                .unwrap_or("unknown");
            LlmError::InvalidPayload(format!("candidate has no content (finish reason {reason})"))
        })?;

    let text = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|value| value.as_str()))
        .collect::<String>();

    if text.trim().is_empty() {
        return Err(LlmError::InvalidPayload("candidate text is empty".to_string()));
    }
    Ok(text)
}

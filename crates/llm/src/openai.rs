use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::{
    http_client, status_error, ChatFuture, ChatModel, ChatRequest, LlmConfig, LlmError, Role, Turn,
};

/// Chat model backed by the OpenAI Responses API.
pub struct OpenAiChatModel {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client(config)?,
            endpoint: format!("{}/v1/responses", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    async fn respond(&self, request: ChatRequest<'_>) -> Result<String, LlmError> {
        let payload = request_payload(&self.model, request.turns);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.as_str())
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
        let reply = extract_output_text(&body)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| LlmError::InvalidPayload("output text missing".to_string()))?;

        debug!(
            purpose = request.purpose.as_str(),
            reply_chars = reply.chars().count(),
            "openai reply received"
        );
        Ok(reply)
    }
}

impl ChatModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn complete<'a>(&'a self, request: ChatRequest<'a>) -> ChatFuture<'a> {
        Box::pin(self.respond(request))
    }
}

fn request_payload(model: &str, turns: &[Turn]) -> Value {
    let input = turns
        .iter()
        .map(|turn| {
            let (role, kind) = match turn.role {
                Role::User => ("user", "input_text"),
                Role::Model => ("assistant", "output_text"),
            };
            serde_json::json!({
                "role": role,
                "content": [{ "type": kind, "text": turn.text }]
            })
        })
        .collect::<Vec<_>>();

    serde_json::json!({
        "model": model,
        "input": input
    })
}

fn extract_output_text(payload: &Value) -> Option<String> {
    if let Some(value) = payload.get("output_text").and_then(|value| value.as_str()) {
        return Some(value.to_string());
    }
    let output = payload.get("output")?.as_array()?;
    let chunks = output
        .iter()
        .filter_map(|item| item.get("content").and_then(|value| value.as_array()))
        .flatten()
        .filter(|content| {
            content.get("type").and_then(|value| value.as_str()) == Some("output_text")
        })
        .filter_map(|content| content.get("text").and_then(|value| value.as_str()))
        .collect::<Vec<_>>();

    if chunks.is_empty() {
        None
    } else {
        Some(chunks.join("\n\n"))
    }
}

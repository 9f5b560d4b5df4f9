use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ChatModel, ChatRequest, LlmError, Turn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPurpose {
    Alternative,
    Primary,
    OutputFilter,
}

impl SessionPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alternative => "alt",
            Self::Primary => "main",
            Self::OutputFilter => "out_filter",
        }
    }
}

/// A remote conversation whose transcript starts with fixed seed turns and
/// then alternates user and model turns.
pub struct ConversationSession {
    purpose: SessionPurpose,
    model: Arc<dyn ChatModel>,
    transcript: Vec<Turn>,
    seed_len: usize,
}

impl fmt::Debug for ConversationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationSession")
            .field("purpose", &self.purpose)
            .field("model", &self.model.model_name())
            .field("seed_len", &self.seed_len)
            .field("exchanges", &self.exchanges())
            .finish()
    }
}

impl ConversationSession {
    /// Seeds the session with the instruction and, when given, a second user
    /// turn carrying reference context. No request is made.
    pub fn create(
        purpose: SessionPurpose,
        model: Arc<dyn ChatModel>,
        instruction: &str,
        seed_context: Option<String>,
    ) -> Self {
        let mut transcript = vec![Turn::user(instruction)];
        transcript.extend(seed_context.map(Turn::user));
        let seed_len = transcript.len();

        Self {
            purpose,
            model,
            transcript,
            seed_len,
        }
    }

    pub fn purpose(&self) -> SessionPurpose {
        self.purpose
    }

    pub fn seed(&self) -> &[Turn] {
        &self.transcript[..self.seed_len]
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn exchanges(&self) -> usize {
        (self.transcript.len() - self.seed_len) / 2
    }

    /// Sends `text` with the full transcript. The user turn and the reply are
    /// committed together, only once the reply arrives.
    pub async fn send(&mut self, text: &str) -> Result<String, LlmError> {
        let mut turns = Vec::with_capacity(self.transcript.len() + 1);
        turns.extend_from_slice(&self.transcript);
        turns.push(Turn::user(text));

        let reply = self
            .model
            .complete(ChatRequest {
                purpose: self.purpose,
                turns: &turns,
            })
            .await?;

        debug!(
            purpose = self.purpose.as_str(),
            history = turns.len(),
            "session exchange committed"
        );

        self.transcript = turns;
        self.transcript.push(Turn::model(reply.clone()));
        Ok(reply)
    }
}

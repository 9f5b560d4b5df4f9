#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use campus_agents::PrivacyFilterAgent;
use campus_core::PromptSet;
use campus_directory::{Directory, DirectoryCache};
use campus_llm::{ChatFuture, ChatModel, ChatRequest, LlmError, SessionPurpose, Turn};
use campus_ml::ClassifierStack;
use campus_observability::AppMetrics;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

pub const ALT_SUGGESTION: &str =
    "개인정보 대신 '국사학과 학생들의 평균 학년은 어떻게 되나요?'처럼 통계를 물어보세요.";
pub const MAIN_ANSWER: &str = "컴퓨터공학부 학생은 6명입니다.";

static DIRECTORIES: Lazy<DirectoryCache> = Lazy::new(DirectoryCache::new);

#[derive(Debug, Clone)]
pub enum Script {
    Reply(String),
    /// Returns the last user turn unchanged.
    Echo,
    Fail(u16),
    Slow(Duration, String),
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub purpose: SessionPurpose,
    pub turns: Vec<Turn>,
}

impl RecordedCall {
    pub fn last_text(&self) -> &str {
        self.turns.last().map(|turn| turn.text.as_str()).unwrap_or("")
    }
}

/// Remote model stand-in answering per conversation purpose and recording
/// every request it receives.
pub struct ScriptedModel {
    scripts: HashMap<SessionPurpose, Script>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        let scripts = HashMap::from([
            (SessionPurpose::Alternative, Script::Reply(ALT_SUGGESTION.to_string())),
            (SessionPurpose::Primary, Script::Reply(MAIN_ANSWER.to_string())),
            (SessionPurpose::OutputFilter, Script::Echo),
        ]);
        Self {
            scripts,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, purpose: SessionPurpose, script: Script) -> Self {
        self.scripts.insert(purpose, script);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn purposes(&self) -> Vec<SessionPurpose> {
        self.calls.lock().iter().map(|call| call.purpose).collect()
    }
}

impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    fn complete<'a>(&'a self, request: ChatRequest<'a>) -> ChatFuture<'a> {
        Box::pin(async move {
            let call = RecordedCall {
                purpose: request.purpose,
                turns: request.turns.to_vec(),
            };
            let last = call.last_text().to_string();
            self.calls.lock().push(call);

            match self.scripts.get(&request.purpose).cloned() {
                Some(Script::Reply(text)) => Ok(text),
                Some(Script::Echo) => Ok(last),
                Some(Script::Fail(status)) => Err(LlmError::Status {
                    status,
                    body: "scripted failure".to_string(),
                }),
                Some(Script::Slow(delay, text)) => {
                    tokio::time::sleep(delay).await;
                    Ok(text)
                }
                None => Err(LlmError::InvalidPayload("no script".to_string())),
            }
        })
    }
}

pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

pub fn bundled_directory() -> Arc<Directory> {
    DIRECTORIES
        .load(workspace_root().join("data/directory.json"))
        .expect("bundled directory loads")
}

pub fn bundled_classifier() -> ClassifierStack {
    ClassifierStack::load(workspace_root().join("models/intent-classifier"))
        .expect("bundled classifier loads")
}

pub fn agent_with(model: Arc<ScriptedModel>) -> PrivacyFilterAgent {
    PrivacyFilterAgent::new(
        bundled_classifier(),
        model,
        bundled_directory(),
        PromptSet::korean(),
        AppMetrics::shared(),
    )
}

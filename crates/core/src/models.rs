use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    Ko,
    En,
}

impl Locale {
    pub fn from_optional_str(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()) {
            Some(v) if v == "en" || v == "en-us" || v == "english" => Self::En,
            _ => Self::Ko,
        }
    }

    pub fn as_code(self) -> &'static str {
        match self {
            Self::Ko => "ko",
            Self::En => "en",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("classifier produced unknown class id {0}")]
    UnknownClassId(usize),
}

/// Binary verdict of the input filter. Class id 0 is non-sensitive, 1 is sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityLabel {
    NonSensitive,
    Sensitive,
}

impl SensitivityLabel {
    pub fn from_class_id(class_id: usize) -> Result<Self, LabelError> {
        match class_id {
            0 => Ok(Self::NonSensitive),
            1 => Ok(Self::Sensitive),
            other => Err(LabelError::UnknownClassId(other)),
        }
    }

    pub fn class_id(self) -> usize {
        match self {
            Self::NonSensitive => 0,
            Self::Sensitive => 1,
        }
    }

    pub fn as_label(self) -> &'static str {
        match self {
            Self::NonSensitive => "LABEL_0",
            Self::Sensitive => "LABEL_1",
        }
    }

    pub fn is_sensitive(self) -> bool {
        self == Self::Sensitive
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Append-only transcript shown to the user. Entries are only ever added in
/// (user, assistant) pairs, so the roles strictly alternate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatHistory {
    entries: Vec<ChatEntry>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_exchange(
        &mut self,
        user_text: impl Into<String>,
        assistant_text: impl Into<String>,
    ) {
        let at = Utc::now();
        self.entries.push(ChatEntry {
            role: ChatRole::User,
            text: user_text.into(),
            at,
        });
        self.entries.push(ChatEntry {
            role: ChatRole::Assistant,
            text: assistant_text.into(),
            at,
        });
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn turn_count(&self) -> usize {
        self.entries.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which conversation produced the reply for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRoute {
    /// Sensitive input: the alternative-question advisor answered.
    Alternative,
    /// Non-sensitive input: the directory assistant answered and the output
    /// filter re-checked the answer.
    Answered,
}

/// Audit trail of one filtering turn.
///
/// `candidate_answer` holds the first model response of the branch (the
/// alternative suggestion or the unfiltered directory answer) and
/// `filtered_reply` the output filter's response. Either is `None` when the
/// stage did not run or failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnTrace {
    pub label: SensitivityLabel,
    pub route: TurnRoute,
    pub candidate_answer: Option<String>,
    pub filtered_reply: Option<String>,
    pub final_reply: String,
    pub remote_error: Option<String>,
    pub elapsed_ms: u64,
}

impl TurnTrace {
    pub fn succeeded(&self) -> bool {
        self.remote_error.is_none()
    }
}

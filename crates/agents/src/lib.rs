use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use campus_core::{normalize_text, ChatHistory, PromptSet, TurnRoute, TurnTrace};
use campus_directory::Directory;
use campus_llm::{ChatModel, ConversationSession, LlmError, SessionPurpose};
use campus_ml::{ClassifierStack, Prediction};
use campus_observability::AppMetrics;
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// State of one interactive session: the three remote conversations, the
/// visible history and the trace of the latest turn. Dropping it ends all
/// three conversations.
#[derive(Debug)]
pub struct ChatSession {
    id: String,
    created_at: DateTime<Utc>,
    alt: ConversationSession,
    main: ConversationSession,
    out_filter: ConversationSession,
    history: ChatHistory,
    last_trace: Option<TurnTrace>,
}

impl ChatSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn last_trace(&self) -> Option<&TurnTrace> {
        self.last_trace.as_ref()
    }

    pub fn conversation(&self, purpose: SessionPurpose) -> &ConversationSession {
        match purpose {
            SessionPurpose::Alternative => &self.alt,
            SessionPurpose::Primary => &self.main,
            SessionPurpose::OutputFilter => &self.out_filter,
        }
    }
}

#[derive(Clone)]
pub struct PrivacyFilterAgent {
    classifier: ClassifierStack,
    model: Arc<dyn ChatModel>,
    directory: Arc<Directory>,
    prompts: PromptSet,
    metrics: Arc<AppMetrics>,
}

impl PrivacyFilterAgent {
    pub fn new(
        classifier: ClassifierStack,
        model: Arc<dyn ChatModel>,
        directory: Arc<Directory>,
        prompts: PromptSet,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            classifier,
            model,
            directory,
            prompts,
            metrics,
        }
    }

    /// Creates the alt, main and outFilter conversations for a new session.
    /// Only main carries the directory as background context.
    pub fn open_session(&self) -> ChatSession {
        let directory_context = self.prompts.directory_context(self.directory.serialized());

        ChatSession {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            alt: ConversationSession::create(
                SessionPurpose::Alternative,
                Arc::clone(&self.model),
                self.prompts.alternative_recommender,
                None,
            ),
            main: ConversationSession::create(
                SessionPurpose::Primary,
                Arc::clone(&self.model),
                self.prompts.primary,
                Some(directory_context),
            ),
            out_filter: ConversationSession::create(
                SessionPurpose::OutputFilter,
                Arc::clone(&self.model),
                self.prompts.output_filter,
                None,
            ),
            history: ChatHistory::new(),
            last_trace: None,
        }
    }

    pub fn classify(&self, text: &str) -> Result<Prediction> {
        let prediction = self
            .classifier
            .classifier
            .classify(&normalize_text(text))
            .context("classifying input")?;
        self.metrics.inc_classifier_inference();
        Ok(prediction)
    }

    /// Runs one message through the filter and records the exchange.
    ///
    /// Sensitive input is answered by the alt conversation alone. Anything
    /// else is answered by main, and main's answer is passed through
    /// outFilter whose response becomes the reply. A failed remote call
    /// turns into a visible error reply; a failed classification aborts the
    /// turn without recording anything.
    ///
    /// Only the classifier sees whitespace-normalized text; the conversations
    /// and the history receive the message as submitted, trimmed.
    #[instrument(skip(self, session, message), fields(session_id = %session.id))]
    pub async fn handle_turn(
        &self,
        session: &mut ChatSession,
        message: &str,
    ) -> Result<TurnTrace> {
        let started = Instant::now();
        let message = message.trim();
        if message.is_empty() {
            bail!("message is empty");
        }

        let label = self.classify(message)?.label;
        self.metrics.inc_turn();
        self.metrics.inc_routed(label.is_sensitive());

        let (route, candidate_answer, filtered_reply, outcome) = if label.is_sensitive() {
            let outcome = session.alt.send(message).await;
            let candidate = outcome.as_ref().ok().cloned();
            (TurnRoute::Alternative, candidate, None, outcome)
        } else {
            match session.main.send(message).await {
                Ok(answer) => {
                    let outcome = session.out_filter.send(&answer).await;
                    let filtered = outcome.as_ref().ok().cloned();
                    (TurnRoute::Answered, Some(answer), filtered, outcome)
                }
                Err(err) => (TurnRoute::Answered, None, None, Err(err)),
            }
        };

        let (final_reply, remote_error) = match outcome {
            Ok(reply) => (reply, None),
            Err(err) => (self.remote_failure(route, &err), Some(err.to_string())),
        };

        session.history.record_exchange(message, final_reply.clone());

        let elapsed = started.elapsed();
        self.metrics.observe_latency(elapsed);

        let trace = TurnTrace {
            label,
            route,
            candidate_answer,
            filtered_reply,
            final_reply,
            remote_error,
            elapsed_ms: elapsed.as_millis() as u64,
        };

        info!(
            label = label.as_label(),
            route = ?route,
            failed = !trace.succeeded(),
            elapsed_ms = trace.elapsed_ms,
            "turn handled"
        );

        session.last_trace = Some(trace.clone());
        Ok(trace)
    }

    fn remote_failure(&self, route: TurnRoute, err: &LlmError) -> String {
        self.metrics.inc_remote_failure();
        warn!(route = ?route, error = %err, "remote model call failed");
        self.prompts.error_reply(err)
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn prompts(&self) -> &PromptSet {
        &self.prompts
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    pub fn classifier_model(&self) -> &str {
        self.classifier.classifier.model_name()
    }

    pub fn burn_enabled(&self) -> bool {
        self.classifier.burn_enabled
    }

    pub fn llm_model(&self) -> &str {
        self.model.model_name()
    }
}

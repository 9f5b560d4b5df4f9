use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Json, Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use campus_agents::{ChatSession, PrivacyFilterAgent};
use campus_core::{example_questions, normalize_text, Locale, PromptSet, TurnTrace};
use campus_directory::{DirectoryCache, DEFAULT_DATA_PATH};
use campus_llm::{build_chat_model, LlmConfig};
use campus_ml::ClassifierStack;
use campus_observability::{AppMetrics, MetricsSnapshot};
use campus_storage::SessionStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

const DEFAULT_SESSION_IDLE_SECONDS: i64 = 60 * 60;
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<PrivacyFilterAgent>,
    pub sessions: Arc<SessionStore<ChatSession>>,
    pub metrics: Arc<AppMetrics>,
    pub session_idle: chrono::Duration,
}

impl ApiState {
    pub fn new(agent: PrivacyFilterAgent, session_idle: chrono::Duration) -> Self {
        let metrics = Arc::clone(agent.metrics());
        Self {
            agent: Arc::new(agent),
            sessions: SessionStore::shared(),
            metrics,
            session_idle,
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
    capabilities: HealthCapabilities,
}

#[derive(Debug, Serialize)]
struct HealthCapabilities {
    classifier_model: String,
    burn_enabled: bool,
    llm_model: String,
    locale: &'static str,
    departments: usize,
    live_sessions: usize,
}

#[derive(Debug, Deserialize)]
struct ClassifyRequest {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    session_id: Option<String>,
    text: String,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    session_id: String,
    reply: String,
    trace: TurnTrace,
}

/// Builds the shared state from the environment: dataset, classifier, remote
/// model and prompt locale.
pub fn build_state() -> Result<ApiState> {
    let data_path = env::var("CAMPUS_DATA_PATH").unwrap_or_else(|_| DEFAULT_DATA_PATH.to_string());
    let locale = Locale::from_optional_str(env::var("CAMPUS_LOCALE").ok().as_deref());
    let session_idle = chrono::Duration::seconds(
        env::var("CAMPUS_SESSION_IDLE_SECONDS")
            .ok()
            .and_then(|value| value.parse::<i64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_SESSION_IDLE_SECONDS),
    );

    let directory = DirectoryCache::new()
        .load(&data_path)
        .with_context(|| format!("failed to load directory dataset from {data_path}"))?;
    let classifier = ClassifierStack::load_default().context("failed to load intent classifier")?;
    let llm_config = LlmConfig::from_env().context("invalid llm configuration")?;
    let model = build_chat_model(&llm_config).context("failed to build llm client")?;

    info!(
        departments = directory.len(),
        fingerprint = %directory.fingerprint(),
        classifier = classifier.classifier.model_name(),
        llm_model = model.model_name(),
        locale = locale.as_code(),
        "privacy filter state ready"
    );

    let agent = PrivacyFilterAgent::new(
        classifier,
        model,
        directory,
        PromptSet::for_locale(locale),
        AppMetrics::shared(),
    );
    Ok(ApiState::new(agent, session_idle))
}

pub fn build_app() -> Result<Router> {
    Ok(build_router(build_state()?))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/examples", get(examples))
        .route("/v1/departments", get(departments))
        .route("/v1/departments/:name/students", get(department_students))
        .route("/v1/classify", post(classify))
        .route("/v1/sessions", post(open_session))
        .route("/v1/sessions/:id", delete(close_session))
        .route("/v1/sessions/:id/history", get(session_history))
        .route("/v1/chat", post(chat))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

/// Periodically drops sessions that have been idle longer than
/// `state.session_idle`.
pub fn spawn_session_purger(state: ApiState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let removed = state.sessions.purge_idle(Utc::now(), state.session_idle);
            if removed > 0 {
                info!(removed, live = state.sessions.len(), "idle sessions purged");
            }
        }
    })
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        capabilities: HealthCapabilities {
            classifier_model: state.agent.classifier_model().to_string(),
            burn_enabled: state.agent.burn_enabled(),
            llm_model: state.agent.llm_model().to_string(),
            locale: state.agent.prompts().locale.as_code(),
            departments: state.agent.directory().len(),
            live_sessions: state.sessions.len(),
        },
    };
    (StatusCode::OK, Json(payload))
}

async fn examples(State(state): State<ApiState>) -> impl IntoResponse {
    Json(example_questions(state.agent.prompts().locale))
}

async fn departments(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.agent.directory().summarize().to_vec())
}

async fn department_students(
    State(state): State<ApiState>,
    AxumPath(name): AxumPath<String>,
) -> impl IntoResponse {
    let view = state.agent.directory().roster_view(&name);
    Json(serde_json::json!({
        "department": view.department,
        "students": view.students,
        "highest_gpa": view.highest_gpa,
        "lowest_gpa": view.lowest_gpa,
    }))
}

async fn classify(
    State(state): State<ApiState>,
    Json(request): Json<ClassifyRequest>,
) -> Response {
    let text = normalize_text(&request.text);
    if text.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "empty_text", "text must not be empty");
    }

    match state.agent.classify(&text) {
        Ok(prediction) => Json(serde_json::json!({
            "label": prediction.label.as_label(),
            "sensitive": prediction.label.is_sensitive(),
            "class_id": prediction.class_id,
            "logits": prediction.logits,
        }))
        .into_response(),
        Err(err) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "classification_failed",
            &format!("{err:#}"),
        ),
    }
}

async fn open_session(State(state): State<ApiState>) -> impl IntoResponse {
    let session = state.agent.open_session();
    let session_id = session.id().to_string();
    let created_at = session.created_at();
    state.sessions.insert(session_id.clone(), session);

    info!(session_id = %session_id, live = state.sessions.len(), "session opened");
    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "session_id": session_id,
            "created_at": created_at.to_rfc3339(),
        })),
    )
}

async fn chat(State(state): State<ApiState>, Json(request): Json<ChatRequest>) -> Response {
    let text = normalize_text(&request.text);
    if text.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "empty_text", "text must not be empty");
    }

    let existing = request
        .session_id
        .as_deref()
        .and_then(|id| state.sessions.get(id).map(|handle| (id.to_string(), handle)));
    let (session_id, handle) = match existing {
        Some(found) => found,
        None => {
            let session = state.agent.open_session();
            let session_id = session.id().to_string();
            let handle = state.sessions.insert(session_id.clone(), session);
            (session_id, handle)
        }
    };

    let Ok(mut session) = handle.try_lock() else {
        return error_response(
            StatusCode::CONFLICT,
            "turn_in_progress",
            "a previous message in this session is still being answered",
        );
    };

    match state.agent.handle_turn(&mut session, &text).await {
        Ok(trace) => Json(ChatResponse {
            session_id,
            reply: trace.final_reply.clone(),
            trace,
        })
        .into_response(),
        Err(err) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "turn_failed",
            &format!("{err:#}"),
        ),
    }
}

async fn session_history(
    State(state): State<ApiState>,
    AxumPath(id): AxumPath<String>,
) -> Response {
    let Some(handle) = state.sessions.get(&id) else {
        return session_not_found();
    };
    let session = handle.lock().await;

    Json(serde_json::json!({
        "session_id": session.id(),
        "created_at": session.created_at().to_rfc3339(),
        "entries": session.history().entries(),
        "last_trace": session.last_trace(),
    }))
    .into_response()
}

async fn close_session(
    State(state): State<ApiState>,
    AxumPath(id): AxumPath<String>,
) -> Response {
    match state.sessions.remove(&id) {
        Some(_) => {
            info!(session_id = %id, live = state.sessions.len(), "session closed");
            StatusCode::NO_CONTENT.into_response()
        }
        None => session_not_found(),
    }
}

fn session_not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "session_not_found", "unknown session id")
}

fn error_response(status: StatusCode, error: &str, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": error,
            "message": message
        })),
    )
        .into_response()
}

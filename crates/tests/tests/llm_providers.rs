mod support;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use campus_agents::PrivacyFilterAgent;
use campus_core::PromptSet;
use campus_llm::{
    ChatModel, ChatRequest, ConversationSession, GeminiChatModel, LlmConfig, LlmError,
    LlmProvider, OpenAiChatModel, SessionPurpose, Turn,
};
use campus_observability::AppMetrics;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use support::{bundled_classifier, bundled_directory};

#[derive(Debug, Clone)]
struct Captured {
    path: String,
    api_key: Option<String>,
    authorization: Option<String>,
    body: Value,
}

type Captures = Arc<Mutex<Vec<Captured>>>;

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn config(provider: LlmProvider, base_url: String, model: &str, timeout: Duration) -> LlmConfig {
    LlmConfig {
        provider,
        api_key: "test-key".to_string(),
        model: model.to_string(),
        base_url,
        timeout,
        connect_timeout: Duration::from_secs(2),
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn gemini_reply(
    State(captures): State<Captures>,
    Path(call): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    captures.lock().push(Captured {
        path: call,
        api_key: header(&headers, "x-goog-api-key"),
        authorization: None,
        body,
    });
    Json(json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{ "text": "심리학과는 " }, { "text": "16동에 있습니다." }]
            },
            "finishReason": "STOP"
        }]
    }))
}

async fn openai_reply(
    State(captures): State<Captures>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    captures.lock().push(Captured {
        path: "/v1/responses".to_string(),
        api_key: None,
        authorization: header(&headers, "authorization"),
        body,
    });
    Json(json!({
        "output": [{
            "type": "message",
            "content": [{ "type": "output_text", "text": "국사학과 학생회장은 한지우입니다." }]
        }]
    }))
}

async fn never_answers() -> &'static str {
    tokio::time::sleep(Duration::from_secs(30)).await;
    "too late"
}

async fn unavailable() -> (StatusCode, String) {
    (StatusCode::SERVICE_UNAVAILABLE, "overloaded ".repeat(200))
}

#[tokio::test]
async fn gemini_posts_transcript_with_api_key_header() {
    let captures = Captures::default();
    let router = Router::new()
        .route("/v1beta/models/:call", post(gemini_reply))
        .with_state(captures.clone());
    let base = serve(router).await;
    let model = GeminiChatModel::new(&config(
        LlmProvider::Gemini,
        format!("{base}/"),
        "gemini-test",
        Duration::from_secs(5),
    ))
    .unwrap();

    let turns = [
        Turn::user("모든 대답은 반드시 한국어로 해줘."),
        Turn::model("네."),
        Turn::user("심리학과는 어디 있어?"),
    ];
    let reply = model
        .complete(ChatRequest {
            purpose: SessionPurpose::Primary,
            turns: &turns,
        })
        .await
        .unwrap();

    assert_eq!(reply, "심리학과는 16동에 있습니다.");
    let captured = captures.lock()[0].clone();
    assert_eq!(captured.path, "gemini-test:generateContent");
    assert_eq!(captured.api_key.as_deref(), Some("test-key"));
    let contents = captured.body["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[2]["parts"][0]["text"], "심리학과는 어디 있어?");
}

#[tokio::test]
async fn openai_posts_responses_request_with_bearer_auth() {
    let captures = Captures::default();
    let router = Router::new()
        .route("/v1/responses", post(openai_reply))
        .with_state(captures.clone());
    let base = serve(router).await;
    let model = OpenAiChatModel::new(&config(
        LlmProvider::OpenAi,
        base,
        "gpt-test",
        Duration::from_secs(5),
    ))
    .unwrap();

    let turns = [Turn::user("국사학과 학생회장은 누구야?")];
    let reply = model
        .complete(ChatRequest {
            purpose: SessionPurpose::Primary,
            turns: &turns,
        })
        .await
        .unwrap();

    assert_eq!(reply, "국사학과 학생회장은 한지우입니다.");
    let captured = captures.lock()[0].clone();
    assert_eq!(captured.authorization.as_deref(), Some("Bearer test-key"));
    assert_eq!(captured.body["model"], "gpt-test");
}

#[tokio::test]
async fn error_status_keeps_code_and_truncates_body() {
    let router = Router::new().route("/v1beta/models/:call", post(unavailable));
    let base = serve(router).await;
    let model = GeminiChatModel::new(&config(
        LlmProvider::Gemini,
        base,
        "gemini-test",
        Duration::from_secs(5),
    ))
    .unwrap();

    let turns = [Turn::user("안녕")];
    let err = model
        .complete(ChatRequest {
            purpose: SessionPurpose::Alternative,
            turns: &turns,
        })
        .await
        .unwrap_err();

    match err {
        LlmError::Status { status, body } => {
            assert_eq!(status, 503);
            assert!(body.starts_with("overloaded overloaded"));
            assert!(body.ends_with("..."));
            assert_eq!(body.chars().count(), 512 + 3);
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_provider_times_out_and_session_is_unchanged() {
    let router = Router::new().route("/v1/responses", post(never_answers));
    let base = serve(router).await;
    let model: Arc<dyn ChatModel> = Arc::new(
        OpenAiChatModel::new(&config(
            LlmProvider::OpenAi,
            base,
            "gpt-test",
            Duration::from_millis(150),
        ))
        .unwrap(),
    );
    let mut session =
        ConversationSession::create(SessionPurpose::OutputFilter, model, "echo the input", None);

    let err = session.send("심리학과 평균 학점은 3.12입니다.").await.unwrap_err();

    assert!(matches!(err, LlmError::Timeout), "{err:?}");
    assert_eq!(session.transcript().len(), 1);
    assert_eq!(session.exchanges(), 0);
}

#[tokio::test]
async fn timeout_becomes_visible_error_reply() {
    let router = Router::new().route("/v1beta/models/:call", post(never_answers));
    let base = serve(router).await;
    let model: Arc<dyn ChatModel> = Arc::new(
        GeminiChatModel::new(&config(
            LlmProvider::Gemini,
            base,
            "gemini-test",
            Duration::from_millis(150),
        ))
        .unwrap(),
    );
    let agent = PrivacyFilterAgent::new(
        bundled_classifier(),
        model,
        bundled_directory(),
        PromptSet::korean(),
        AppMetrics::shared(),
    );
    let mut session = agent.open_session();

    let trace = agent
        .handle_turn(&mut session, "컴퓨터공학부 학생 수는 몇 명이야?")
        .await
        .unwrap();

    assert_eq!(trace.final_reply, "⚠️ 오류가 발생했습니다: llm request timed out");
    assert_eq!(trace.remote_error.as_deref(), Some("llm request timed out"));
    assert!(trace.candidate_answer.is_none());
    assert_eq!(session.history().entries()[1].text, trace.final_reply);
}

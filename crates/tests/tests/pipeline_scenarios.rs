mod support;

use std::sync::Arc;

use campus_core::{example_questions, ChatRole, Locale, SensitivityLabel, TurnRoute};
use campus_llm::{Role, SessionPurpose};

use support::{agent_with, bundled_directory, Script, ScriptedModel, ALT_SUGGESTION, MAIN_ANSWER};

#[tokio::test]
async fn department_question_is_answered_then_filtered() {
    let model = Arc::new(ScriptedModel::new());
    let agent = agent_with(model.clone());
    let mut session = agent.open_session();

    let trace = agent
        .handle_turn(&mut session, "컴퓨터공학부 학생 수는 몇 명이야?")
        .await
        .unwrap();

    assert_eq!(trace.label, SensitivityLabel::NonSensitive);
    assert_eq!(trace.route, TurnRoute::Answered);
    assert_eq!(
        model.purposes(),
        vec![SessionPurpose::Primary, SessionPurpose::OutputFilter]
    );

    let calls = model.calls();
    assert_eq!(calls[0].last_text(), "컴퓨터공학부 학생 수는 몇 명이야?");
    assert_eq!(calls[1].last_text(), MAIN_ANSWER);
    assert_eq!(trace.candidate_answer.as_deref(), Some(MAIN_ANSWER));
    assert_eq!(trace.final_reply, MAIN_ANSWER);

    let history = session.history().entries();
    assert_eq!(history[1].text, MAIN_ANSWER);
}

#[tokio::test]
async fn student_question_gets_alternative_suggestion_only() {
    let model = Arc::new(ScriptedModel::new());
    let agent = agent_with(model.clone());
    let mut session = agent.open_session();

    let trace = agent
        .handle_turn(&mut session, "김하윤 학생의 학번 알려줘")
        .await
        .unwrap();

    assert_eq!(trace.label, SensitivityLabel::Sensitive);
    assert_eq!(model.purposes(), vec![SessionPurpose::Alternative]);
    assert_eq!(trace.final_reply, ALT_SUGGESTION);
    assert!(trace.filtered_reply.is_none());
    assert_eq!(session.conversation(SessionPurpose::Primary).exchanges(), 0);
    assert_eq!(session.conversation(SessionPurpose::OutputFilter).exchanges(), 0);
}

#[tokio::test]
async fn primary_request_carries_directory_context() {
    let model = Arc::new(ScriptedModel::new());
    let agent = agent_with(model.clone());
    let mut session = agent.open_session();

    agent
        .handle_turn(&mut session, "국사학과 학생회장은 누구야?")
        .await
        .unwrap();

    let calls = model.calls();
    let seed = &calls[0].turns;
    assert_eq!(seed.len(), 3);
    assert!(seed[..2].iter().all(|turn| turn.role == Role::User));
    assert!(seed[1].text.contains(bundled_directory().serialized()));
    assert!(seed[1].text.contains("한지우"));

    // The filter sees only main's answer, never the dataset.
    assert!(!calls[1].turns.iter().any(|turn| turn.text.contains("학생목록")));
}

#[tokio::test]
async fn every_example_routes_by_its_group() {
    let examples = example_questions(Locale::Ko);
    let model = Arc::new(ScriptedModel::new());
    let agent = agent_with(model.clone());
    let mut session = agent.open_session();

    for question in examples.general {
        let trace = agent.handle_turn(&mut session, question).await.unwrap();
        assert_eq!(trace.route, TurnRoute::Answered, "{question}");
    }
    for question in examples.sensitive {
        let trace = agent.handle_turn(&mut session, question).await.unwrap();
        assert_eq!(trace.route, TurnRoute::Alternative, "{question}");
    }

    let entries = session.history().entries();
    assert_eq!(entries.len(), 2 * (examples.general.len() + examples.sensitive.len()));
    assert!(entries
        .chunks(2)
        .all(|pair| pair[0].role == ChatRole::User && pair[1].role == ChatRole::Assistant));

    let snapshot = agent.metrics().snapshot();
    assert_eq!(snapshot.safe_total, examples.general.len() as u64);
    assert_eq!(snapshot.sensitive_total, examples.sensitive.len() as u64);
}

#[tokio::test]
async fn alternative_failure_is_visible_and_session_continues() {
    let model = Arc::new(ScriptedModel::new().with(SessionPurpose::Alternative, Script::Fail(429)));
    let agent = agent_with(model.clone());
    let mut session = agent.open_session();

    let failed = agent
        .handle_turn(&mut session, "장윤서의 주소가 뭐야?")
        .await
        .unwrap();
    assert!(failed.final_reply.starts_with("⚠️ 오류가 발생했습니다:"));
    assert!(failed.final_reply.contains("429"));
    assert!(failed.candidate_answer.is_none());

    let next = agent
        .handle_turn(&mut session, "심리학과 평균 학점 알려줘")
        .await
        .unwrap();
    assert!(next.succeeded());
    assert_eq!(session.history().turn_count(), 2);
    assert_eq!(session.history().entries()[1].text, failed.final_reply);
}

#[tokio::test]
async fn sessions_do_not_share_transcripts() {
    let model = Arc::new(ScriptedModel::new());
    let agent = agent_with(model.clone());
    let mut first = agent.open_session();
    let mut second = agent.open_session();

    agent
        .handle_turn(&mut first, "언어학과의 웹사이트 주소 알려줘")
        .await
        .unwrap();
    agent
        .handle_turn(&mut second, "사회복지학과는 어느 건물에 있어?")
        .await
        .unwrap();

    assert_ne!(first.id(), second.id());
    assert_eq!(second.history().turn_count(), 1);
    let second_main = model.calls()[2].turns.clone();
    assert_eq!(second_main.len(), 3);
}

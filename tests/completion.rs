use chat_relay::llm::gemini::GeminiClient;
use chat_relay::models::message::{ Message, Part };
use chat_relay::widget::{
    CompletionOutcome,
    Conversation,
    StaticGate,
    WidgetConfig,
    WidgetHost,
};

use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{ body_json, method, path, query_param };
use wiremock::{ Mock, MockServer, ResponseTemplate };

const ENDPOINT: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

fn conversation(server: &MockServer, api_key: Option<&str>, context: Option<&str>) -> Conversation {
    let client = GeminiClient::new(
        None,
        Some(format!("{}/v1beta", server.uri())),
        reqwest::Client::new()
    );
    let mut host = WidgetHost::new(WidgetConfig {
        api_key: api_key.map(str::to_owned),
        system_context: context.map(str::to_owned),
        ..WidgetConfig::default()
    });
    host.set_ai_gate(Some(Arc::new(StaticGate(true))));
    Conversation::new(host, Arc::new(client))
}

fn reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
    )
}

#[tokio::test]
async fn test_successful_completion_appends_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(query_param("key", "test-key"))
        .and(
            body_json(
                json!({
            "system_instruction": {"parts": [{"text": "You are terse."}]},
            "contents": [{"role": "user", "parts": [{"text": "hi"}]}]
        })
            )
        )
        .respond_with(reply("T"))
        .expect(1)
        .mount(&server).await;

    let convo = conversation(&server, Some("test-key"), Some("You are terse."));
    let (_, outcome) = convo.send("hi", vec![]).await;

    assert_eq!(outcome, Some(CompletionOutcome::Appended(Message::local_model("T"))));
    let history = convo.history().await;
    assert_eq!(
        history,
        vec![Message::local_user(vec![Part::text("hi")]), Message::local_model("T")]
    );
    assert!(!convo.is_loading());
}

#[tokio::test]
async fn test_server_error_leaves_history_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server).await;

    let convo = conversation(&server, Some("test-key"), None);
    let (_, outcome) = convo.send("hi", vec![]).await;

    assert_eq!(outcome, Some(CompletionOutcome::Failed));
    assert_eq!(convo.history().await.len(), 1);
    assert!(!convo.is_loading());
}

#[tokio::test]
async fn test_missing_api_key_surfaces_as_failed_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(query_param("key", ""))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": {"message": "API key not valid"}}))
        )
        .expect(1)
        .mount(&server).await;

    let convo = conversation(&server, None, None);
    let (_, outcome) = convo.send("hi", vec![]).await;

    assert_eq!(outcome, Some(CompletionOutcome::Failed));
    assert_eq!(convo.history().await.len(), 1);
}

#[tokio::test]
async fn test_response_without_candidates_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server).await;

    let convo = conversation(&server, Some("k"), None);
    let (_, outcome) = convo.send("hi", vec![]).await;

    assert_eq!(outcome, Some(CompletionOutcome::Failed));
    assert_eq!(convo.history().await.len(), 1);
    assert!(!convo.is_loading());
}

#[tokio::test]
async fn test_full_history_is_sent_without_origin_flag() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(
            body_json(
                json!({
            "contents": [
                {"role": "user", "parts": [{"text": "hi"}]},
                {"role": "model", "parts": [{"text": "hello"}]},
                {"role": "user", "parts": [
                    {"text": "look"},
                    {"inline_data": {"mime_type": "image/png", "data": "AAAA"}}
                ]}
            ]
        })
            )
        )
        .respond_with(reply("a cat"))
        .expect(1)
        .mount(&server).await;

    let convo = conversation(&server, Some("k"), None);
    convo.host().lock().await.push_history(
        vec![
            Message::local_user(vec![Part::text("hi")]).into_remote(),
            Message::local_model("hello").into_remote()
        ]
    );

    let (_, outcome) = convo.send("look", vec![Part::attachment("image/png", "AAAA")]).await;
    assert_eq!(outcome, Some(CompletionOutcome::Appended(Message::local_model("a cat"))));
}

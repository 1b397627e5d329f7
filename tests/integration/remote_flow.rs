//! Full command flow through the Ollama-backed strategy.

use crate::helpers::{Action, RecordingDriver, harness_with, test_config};
use buddy::config::IntentStrategy;
use buddy::intent::Intent;
use buddy::IntentEngine;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn generate_reply(inner: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "model": "llama3:8b", "response": inner }))
}

async fn mock_ollama(classification: &str, confirmation: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "models": [{ "name": "llama3:8b", "size": 1 }] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({ "format": "json" })))
        .respond_with(generate_reply(classification))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(generate_reply(confirmation))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn remote_open_uses_generated_confirmation() {
    let server = mock_ollama(
        r#"{"intent": "open", "parameters": {"website": "youtube.com"}, "response": ""}"#,
        "  Opening YouTube for you.  ",
    )
    .await;

    let mut config = test_config();
    config.intent.strategy = IntentStrategy::Remote;
    config.llm.base_url = server.uri();
    let engine = IntentEngine::from_config(&config).await.unwrap();
    assert_eq!(engine.strategy_name(), "remote");

    let h = harness_with(engine, RecordingDriver::default(), &config);
    let resolution = h.orchestrator.handle_text("take me to youtube").await;

    assert_eq!(resolution.intent(), Intent::Open);
    assert_eq!(resolution.target(), Some("youtube.com"));
    assert_eq!(h.spoken().await, ["Opening YouTube for you."]);
    assert_eq!(h.driver.actions().len(), 5);
    assert_eq!(h.driver.actions()[3], Action::Type("youtube.com".into()));
    h.orchestrator.shutdown().await;
}

#[tokio::test]
async fn remote_conversation_is_spoken_without_action() {
    let server = mock_ollama(
        r#"{"intent": "conversation", "response": "I'm doing well, thanks!"}"#,
        "unused",
    )
    .await;

    let mut config = test_config();
    config.intent.strategy = IntentStrategy::Remote;
    config.llm.base_url = server.uri();
    let engine = IntentEngine::from_config(&config).await.unwrap();

    let h = harness_with(engine, RecordingDriver::default(), &config);
    h.orchestrator.handle_text("how are you").await;

    assert_eq!(h.spoken().await, ["I'm doing well, thanks!"]);
    assert!(h.driver.actions().is_empty());
    h.orchestrator.shutdown().await;
}

#[tokio::test]
async fn greeting_comes_from_rules() {
    let server = mock_ollama("{}", "should not be used").await;

    let mut config = test_config();
    config.intent.strategy = IntentStrategy::Remote;
    config.llm.base_url = server.uri();
    let engine = IntentEngine::from_config(&config).await.unwrap();

    let h = harness_with(engine, RecordingDriver::default(), &config);
    h.orchestrator.greet().await;
    assert_eq!(h.spoken().await, ["Yes, I am here."]);
    h.orchestrator.shutdown().await;
}

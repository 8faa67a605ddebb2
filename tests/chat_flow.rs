//! Integration tests for the conversation flow against a mocked backend.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use empa::chat::controller::FALLBACK_REPLY;
use empa::chat::transcript::Role;
use empa::chat::{ChatBackend, ConversationController};
use empa::face::Expression;
use empa::sensor::messages::{EmotionSnapshot, VocalBand};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn happy_snapshot() -> EmotionSnapshot {
    EmotionSnapshot {
        expression: Expression::Happy,
        confidence: 0.7,
        voice: VocalBand::Calm,
    }
}

fn backend_for(server: &MockServer) -> ChatBackend {
    ChatBackend::new(format!("{}/chat", server.uri()))
}

#[tokio::test]
async fn success_reply_appends_exactly_one_assistant_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "hi"})))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let mut controller = ConversationController::new();
    let before = controller.transcript().len();

    controller
        .send_message(&backend, "hello there", &happy_snapshot())
        .await
        .unwrap();

    let messages = controller.transcript().messages();
    assert_eq!(messages.len(), before + 2);
    assert_eq!(messages[before].role, Role::User);
    assert_eq!(messages[before].content, "hello there");
    assert_eq!(messages[before + 1].role, Role::Assistant);
    assert_eq!(messages[before + 1].content, "hi");
    assert!(!controller.awaiting_reply());
}

#[tokio::test]
async fn request_body_carries_emotion_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_partial_json(json!({
            "message": "how do I look",
            "emotion_context": {
                "face": "happy",
                "voice": "calm",
                "text": "neutral"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "great"})))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let mut controller = ConversationController::new();

    controller
        .send_message(&backend, "how do I look", &happy_snapshot())
        .await
        .unwrap();

    assert_eq!(
        controller.transcript().last().unwrap().content,
        "great"
    );
}

#[tokio::test]
async fn server_error_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let mut controller = ConversationController::new();

    controller
        .send_message(&backend, "hello", &happy_snapshot())
        .await
        .unwrap();

    let last = controller.transcript().last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.content, FALLBACK_REPLY);
    assert!(!controller.awaiting_reply());
}

#[tokio::test]
async fn malformed_body_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let mut controller = ConversationController::new();

    controller
        .send_message(&backend, "hello", &happy_snapshot())
        .await
        .unwrap();

    assert_eq!(
        controller.transcript().last().unwrap().content,
        FALLBACK_REPLY
    );
}

#[tokio::test]
async fn missing_response_field_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": "wrong shape"})))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let mut controller = ConversationController::new();

    controller
        .send_message(&backend, "hello", &happy_snapshot())
        .await
        .unwrap();

    assert_eq!(
        controller.transcript().last().unwrap().content,
        FALLBACK_REPLY
    );
}

#[tokio::test]
async fn connection_failure_falls_back_and_recovers() {
    // Nothing listens here; the request fails at connect time.
    let backend = ChatBackend::new("http://127.0.0.1:9/chat");
    let mut controller = ConversationController::new();

    controller
        .send_message(&backend, "hello", &happy_snapshot())
        .await
        .unwrap();

    assert_eq!(
        controller.transcript().last().unwrap().content,
        FALLBACK_REPLY
    );
    // The user may immediately retry.
    assert!(controller.can_send("hello again"));
}

#[tokio::test]
async fn submission_rejected_while_request_outstanding() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "ok"})))
        .expect(0)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let mut controller = ConversationController::new();

    controller.begin_send("first").unwrap();
    let len_while_awaiting = controller.transcript().len();

    let result = controller
        .send_message(&backend, "second", &happy_snapshot())
        .await;
    assert!(result.is_err());
    assert_eq!(controller.transcript().len(), len_while_awaiting);
    assert!(controller.awaiting_reply());
}

#[tokio::test]
async fn whitespace_submission_is_rejected_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "ok"})))
        .expect(0)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let mut controller = ConversationController::new();
    let before = controller.transcript().len();

    assert!(
        controller
            .send_message(&backend, "   \t ", &happy_snapshot())
            .await
            .is_err()
    );
    assert_eq!(controller.transcript().len(), before);
    assert!(!controller.awaiting_reply());
}

//! HTTP intake contract, exercised through the router with `oneshot` and
//! once over a real socket.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower::ServiceExt;

use replyflow::channels::{ChannelDispatcher, DeliveryHandle, Transport};
use replyflow::error::ChannelError;
use replyflow::execution::SessionStrategy;
use replyflow::pipeline::ExecutionEngine;
use replyflow::store::InMemoryLogStore;
use replyflow::webhook::webhook_routes;
use replyflow::workflow::{Action, Channel, ChannelMessage, InMemoryRegistry, Trigger, Workflow};

#[derive(Default)]
struct RecordingTransport {
    channel: Option<Channel>,
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl Transport for RecordingTransport {
    fn channel(&self) -> Channel {
        self.channel.unwrap_or(Channel::Sms)
    }

    fn name(&self) -> &str {
        "recording"
    }

    async fn send(
        &self,
        recipient: &str,
        _content: &str,
        _subject: Option<&str>,
    ) -> Result<DeliveryHandle, ChannelError> {
        self.sent.lock().unwrap().push(recipient.to_string());
        Ok(DeliveryHandle::new("recording", "1"))
    }
}

fn demo_workflow() -> Workflow {
    Workflow::new(
        "demo",
        Trigger::new("demo", [Channel::Sms, Channel::Email]),
        Action {
            delay: "immediate".into(),
            messages: vec![
                ChannelMessage::text(Channel::Sms, "Here's the demo"),
                ChannelMessage::email("Demo", "Here's the demo"),
            ],
        },
    )
    .activated()
}

fn app(workflows: Vec<Workflow>) -> (Router, Arc<RecordingTransport>) {
    let sms = Arc::new(RecordingTransport {
        channel: Some(Channel::Sms),
        ..Default::default()
    });
    let email = Arc::new(RecordingTransport {
        channel: Some(Channel::Email),
        ..Default::default()
    });
    let dispatcher = ChannelDispatcher::default()
        .with_transport(sms.clone())
        .with_transport(email);
    let engine = ExecutionEngine::new(
        Arc::new(InMemoryRegistry::with_workflows(workflows)),
        InMemoryLogStore::new(),
        Arc::new(dispatcher),
    );
    (
        webhook_routes(Arc::new(engine), SessionStrategy::Greedy),
        sms,
    )
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _) = app(vec![]);
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn inbound_match_dispatches_and_reports() {
    let workflow = demo_workflow();
    let (app, sms) = app(vec![workflow.clone()]);

    let (status, body) = send(
        &app,
        post_json(
            "/webhooks/inbound",
            json!({"sender": "+15551234567", "channel": "SMS", "content": "send the DEMO"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], true);
    assert_eq!(body["outcomes"][0]["outcome"], "sent");
    assert_eq!(body["outcomes"][0]["workflow_id"], workflow.id.to_string());
    assert_eq!(sms.sent.lock().unwrap().as_slice(), ["+15551234567"]);
}

#[tokio::test]
async fn inbound_without_match_returns_false() {
    let (app, sms) = app(vec![demo_workflow()]);

    let (status, body) = send(
        &app,
        post_json(
            "/webhooks/inbound",
            json!({"sender": "+15551234567", "channel": "sms", "content": "hello"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], false);
    assert!(sms.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn inbound_rejects_bad_sender_and_channel() {
    let (app, _) = app(vec![demo_workflow()]);

    let (status, body) = send(
        &app,
        post_json(
            "/webhooks/inbound",
            json!({"sender": "5551234567", "channel": "sms", "content": "demo"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("5551234567"));

    let (status, _) = send(
        &app,
        post_json(
            "/webhooks/inbound",
            json!({"sender": "+15551234567", "channel": "fax", "content": "demo"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        post_json(
            "/webhooks/inbound",
            json!({"sender": "+15551234567", "channel": "sms"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn email_subject_is_scanned_for_keyword() {
    let (app, _) = app(vec![demo_workflow()]);

    let (status, body) = send(
        &app,
        post_json(
            "/webhooks/inbound",
            json!({
                "sender": "jo@example.com",
                "channel": "email",
                "subject": "Demo request",
                "body": "When are you free?"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], true);
}

#[tokio::test]
async fn logs_are_newest_first_and_sessions_grouped() {
    let workflow = demo_workflow();
    let (app, _) = app(vec![workflow.clone()]);

    send(
        &app,
        post_json(
            "/webhooks/inbound",
            json!({"sender": "+15551234567", "channel": "sms", "content": "demo"}),
        ),
    )
    .await;

    let (status, logs) = send(&app, get(&format!("/api/workflows/{}/logs", workflow.id))).await;
    assert_eq!(status, StatusCode::OK);
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 3);
    assert_eq!(logs[0]["kind"], "sent");
    assert_eq!(logs[2]["kind"], "received");

    let (status, sessions) = send(
        &app,
        get(&format!(
            "/api/workflows/{}/sessions?strategy=transitive",
            workflow.id
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let sessions = sessions.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["recipient"], "+15551234567");
    assert_eq!(sessions[0]["entries"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn log_routes_validate_workflow_id() {
    let (app, _) = app(vec![demo_workflow()]);

    let (status, _) = send(&app, get("/api/workflows/not-a-uuid/logs")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        get(&format!("/api/workflows/{}/logs", uuid::Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_route_reports_count() {
    let workflow = demo_workflow();
    let (app, _) = app(vec![workflow.clone()]);

    let (status, body) = send(
        &app,
        Request::post(format!("/api/workflows/{}/cancel", workflow.id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], 0);
}

#[tokio::test]
async fn serves_over_tcp() {
    let (app, _) = app(vec![demo_workflow()]);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    let response = tokio::time::timeout(
        Duration::from_secs(5),
        reqwest::Client::new()
            .post(format!("http://127.0.0.1:{port}/webhooks/inbound"))
            .json(&json!({"sender": "+15551234567", "channel": "sms", "content": "demo"}))
            .send(),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["matched"], true);
}

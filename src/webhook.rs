//! HTTP intake: inbound message webhook plus read-only execution log routes.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Json;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::channels::validate_recipient;
use crate::execution::{SessionStrategy, group_sessions};
use crate::pipeline::{ExecutionEngine, InboundEvent};
use crate::workflow::Channel;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ExecutionEngine>,
    pub session_strategy: SessionStrategy,
}

/// Build the Axum router for inbound webhooks and log reads.
pub fn webhook_routes(engine: Arc<ExecutionEngine>, session_strategy: SessionStrategy) -> Router {
    let state = AppState {
        engine,
        session_strategy,
    };

    Router::new()
        .route("/health", get(health))
        .route("/webhooks/inbound", post(inbound))
        .route("/api/workflows/{id}/logs", get(workflow_logs))
        .route("/api/workflows/{id}/sessions", get(workflow_sessions))
        .route("/api/workflows/{id}/cancel", post(cancel_workflow_sends))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message.into() })),
    )
}

fn internal_error(message: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": message.into() })),
    )
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "replyflow"
    }))
}

// ── Inbound ─────────────────────────────────────────────────────────────

/// `{sender, channel, content}`, or `{sender, channel: "email", subject, body}`.
#[derive(Debug, Deserialize)]
struct InboundPayload {
    sender: String,
    channel: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

impl InboundPayload {
    fn into_event(self) -> Result<InboundEvent, String> {
        let channel: Channel = self.channel.parse()?;
        let sender = self.sender.trim().to_string();
        validate_recipient(channel, &sender).map_err(|e| e.to_string())?;

        let structured_email =
            channel == Channel::Email && (self.subject.is_some() || self.body.is_some());
        if structured_email {
            let body = self.body.or(self.content).unwrap_or_default();
            let subject = self.subject.unwrap_or_default();
            return Ok(InboundEvent::from_email(sender, &subject, &body));
        }

        match self.content.or(self.body) {
            Some(content) => Ok(InboundEvent::new(sender, content, channel)),
            None => Err("missing message content".to_string()),
        }
    }
}

async fn inbound(
    State(state): State<AppState>,
    Json(payload): Json<InboundPayload>,
) -> impl IntoResponse {
    let event = match payload.into_event() {
        Ok(event) => event,
        Err(message) => return bad_request(message),
    };

    info!(channel = %event.channel, "Inbound webhook received");
    match state.engine.handle_event(event).await {
        Ok(report) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "matched": report.matched(),
                "outcomes": report.outcomes,
            })),
        ),
        Err(e) => {
            error!("Inbound processing failed: {}", e);
            internal_error(e.to_string())
        }
    }
}

// ── Logs ────────────────────────────────────────────────────────────────

fn parse_workflow_id(id: &str) -> Result<Uuid, (StatusCode, Json<serde_json::Value>)> {
    Uuid::parse_str(id).map_err(|_| bad_request("Invalid workflow ID"))
}

/// Resolve a workflow id that the registry knows about.
async fn known_workflow(
    state: &AppState,
    id: &str,
) -> Result<Uuid, (StatusCode, Json<serde_json::Value>)> {
    let id = parse_workflow_id(id)?;
    match state.engine.registry().get(id).await {
        Ok(Some(_)) => Ok(id),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Workflow not found" })),
        )),
        Err(e) => Err(internal_error(e.to_string())),
    }
}

async fn workflow_logs(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let id = match known_workflow(&state, &id).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.engine.logs().read(id).await {
        Ok(mut entries) => {
            // Newest first; among equal timestamps the later append wins.
            entries.reverse();
            entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            (StatusCode::OK, Json(serde_json::json!(entries)))
        }
        Err(e) => internal_error(e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    strategy: Option<String>,
}

async fn workflow_sessions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<SessionQuery>,
) -> impl IntoResponse {
    let strategy = match query.strategy.as_deref().map(str::parse::<SessionStrategy>) {
        Some(Ok(strategy)) => strategy,
        Some(Err(message)) => return bad_request(message),
        None => state.session_strategy,
    };
    let id = match known_workflow(&state, &id).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.engine.logs().read(id).await {
        Ok(entries) => {
            let sessions = group_sessions(entries, strategy);
            (StatusCode::OK, Json(serde_json::json!(sessions)))
        }
        Err(e) => internal_error(e.to_string()),
    }
}

async fn cancel_workflow_sends(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id = match parse_workflow_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let cancelled = state.engine.cancel_scheduled(id).await;
    (
        StatusCode::OK,
        Json(serde_json::json!({ "cancelled": cancelled })),
    )
}

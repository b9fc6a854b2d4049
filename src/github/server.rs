use std::any::Any;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::mpsc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::catch_panic::CatchPanicLayer;

use crate::github::meta::IpCheck;
use crate::github::webhook::{GitHubWebhook, ReceivedWebhook};

const MAX_BODY_SIZE: usize = 25 * 1024 * 1024;

/// Shared server state for all axum handlers.
pub struct ServerState {
    webhook_queue: mpsc::Sender<ReceivedWebhook>,
    pub(crate) ip_check: IpCheck,
}

impl ServerState {
    pub fn new(webhook_queue: mpsc::Sender<ReceivedWebhook>, ip_check: IpCheck) -> Self {
        Self {
            webhook_queue,
            ip_check,
        }
    }
}

pub type ServerStateRef = Arc<ServerState>;

pub fn create_app(state: ServerState) -> Router {
    Router::new()
        .route("/", post(github_webhook_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(ConcurrencyLimitLayer::new(100))
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(Arc::new(state))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("Router panicked: {err:?}");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "")
}

/// Axum handler that receives a webhook and sends it to the webhook queue.
pub async fn github_webhook_handler(
    State(state): State<ServerStateRef>,
    GitHubWebhook(webhook): GitHubWebhook,
) -> impl IntoResponse {
    tracing::debug!("Received `{}` webhook", webhook.kind);
    match state.webhook_queue.send(webhook).await {
        Ok(_) => (StatusCode::OK, Json(json!({"status": "accepted"}))),
        Err(err) => {
            tracing::error!("Could not send webhook to the queue: {err:?}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error"})),
            )
        }
    }
}

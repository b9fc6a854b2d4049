use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Request};
use axum::http::StatusCode;
use axum::async_trait;
use chrono::{DateTime, Local};

use crate::github::server::ServerStateRef;

/// A webhook accepted by the server, not yet interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedWebhook {
    /// Value of the `X-GitHub-Event` header.
    pub kind: String,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Local>,
}

impl ReceivedWebhook {
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            received_at: Local::now(),
        }
    }

    pub fn action(&self) -> Option<&str> {
        self.payload.get("action").and_then(|action| action.as_str())
    }
}

/// axum extractor for GitHub webhook events.
#[derive(Debug)]
pub struct GitHubWebhook(pub ReceivedWebhook);

/// Extracts a webhook event from a HTTP request.
///
/// The peer address is checked before the body is read.
#[async_trait]
impl FromRequest<ServerStateRef> for GitHubWebhook {
    type Rejection = StatusCode;

    async fn from_request(request: Request, state: &ServerStateRef) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = request.into_parts();

        let ConnectInfo(peer) = ConnectInfo::<SocketAddr>::from_request_parts(&mut parts, state)
            .await
            .map_err(|error| {
                tracing::error!("Cannot determine webhook peer address: {error:?}");
                StatusCode::FORBIDDEN
            })?;
        if !state.ip_check.is_allowed(peer.ip()).await {
            tracing::warn!("Rejecting webhook from {peer}, which is not a GitHub hook address");
            return Err(StatusCode::FORBIDDEN);
        }

        let Some(kind) = parts
            .headers
            .get("x-github-event")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string())
        else {
            tracing::error!("Webhook request is missing the x-github-event header");
            return Err(StatusCode::BAD_REQUEST);
        };

        let body = Bytes::from_request(Request::from_parts(parts, body), state)
            .await
            .map_err(|rejection| {
                tracing::error!("Cannot read webhook body: {rejection:?}");
                rejection.status()
            })?;
        let payload: serde_json::Value = serde_json::from_slice(&body).map_err(|error| {
            tracing::error!("Webhook body of `{kind}` event is not JSON: {error:?}");
            StatusCode::BAD_REQUEST
        })?;

        Ok(GitHubWebhook(ReceivedWebhook::new(kind, payload)))
    }
}

//! Delivery of notifications to a Lark group chat.
use axum::async_trait;
use reqwest::StatusCode;

use crate::notify::directory::LarkUserId;
use crate::notify::render::Notification;

mod client;

pub use client::LarkBotClient;

/// Posts notifications to a chat, mentioning the given users.
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    async fn post(
        &self,
        notification: &Notification,
        recipients: &[LarkUserId],
    ) -> Result<(), DeliveryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Cannot reach the Lark bot: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Lark bot responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Lark bot rejected the message (code {code}): {msg}")]
    Rejected { code: i64, msg: String },
}

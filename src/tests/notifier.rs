use std::sync::{Arc, Mutex};

use axum::async_trait;
use reqwest::StatusCode;

use crate::lark::{ChatNotifier, DeliveryError};
use crate::notify::directory::LarkUserId;
use crate::notify::render::Notification;

/// Remembers every posted notification instead of sending it.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    posts: Arc<Mutex<Vec<(Notification, Vec<LarkUserId>)>>>,
    fail: bool,
}

impl RecordingNotifier {
    /// Records the notifications, but reports every delivery as failed.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn posts(&self) -> Vec<(Notification, Vec<LarkUserId>)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatNotifier for RecordingNotifier {
    async fn post(
        &self,
        notification: &Notification,
        recipients: &[LarkUserId],
    ) -> Result<(), DeliveryError> {
        self.posts
            .lock()
            .unwrap()
            .push((notification.clone(), recipients.to_vec()));
        if self.fail {
            return Err(DeliveryError::Status {
                status: StatusCode::BAD_GATEWAY,
                body: "bad gateway".to_string(),
            });
        }
        Ok(())
    }
}

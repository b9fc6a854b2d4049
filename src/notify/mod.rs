//! Decides who should hear about a webhook event, and what they should be told.
use std::sync::OnceLock;

use crate::github::WebhookEvent;
use crate::notify::involvement::InvolvementMap;

pub mod directory;
pub mod dispatch;
pub mod involvement;
pub mod process;
pub mod render;
pub mod suppress;

/// A webhook event whose kind was recognized.
///
/// The involved users are computed on first access and kept for the lifetime of the event.
#[derive(Debug)]
pub struct ClassifiedEvent {
    event: WebhookEvent,
    involved_users: OnceLock<InvolvementMap>,
}

impl ClassifiedEvent {
    pub fn new(event: WebhookEvent) -> Self {
        Self {
            event,
            involved_users: OnceLock::new(),
        }
    }

    pub fn event(&self) -> &WebhookEvent {
        &self.event
    }

    pub fn sender(&self) -> &str {
        self.event.sender()
    }

    pub fn action(&self) -> &str {
        self.event.action()
    }

    pub fn involved_users(&self) -> &InvolvementMap {
        self.involved_users
            .get_or_init(|| involvement::involved_users(&self.event))
    }
}

impl From<WebhookEvent> for ClassifiedEvent {
    fn from(event: WebhookEvent) -> Self {
        Self::new(event)
    }
}

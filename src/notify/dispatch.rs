use std::sync::Arc;

use itertools::Itertools;

use crate::config::NotifySettings;
use crate::github::{EventKind, WebhookEvent};
use crate::lark::{ChatNotifier, DeliveryError};
use crate::notify::directory::{Directory, DirectoryError, LarkUserId};
use crate::notify::render::render;
use crate::notify::suppress::{skip_reason, SkipReason};
use crate::notify::ClassifiedEvent;

/// What happened to a webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The event kind has no notification rules.
    Unhandled { kind: String },
    Skipped(SkipReason),
    /// The action of the event is not rendered into a message.
    NothingToSend,
    /// Nobody opted in to hear about an event sent by a bot.
    SuppressedNoRecipients,
    Dispatched { recipients: Vec<LarkUserId> },
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Payload of a `{kind}` event is malformed")]
    MalformedPayload {
        kind: EventKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("Cannot deliver notification")]
    Delivery(#[from] DeliveryError),
}

/// Turns webhook events into chat notifications.
pub struct Dispatcher<N> {
    settings: Arc<NotifySettings>,
    directory: Directory,
    notifier: N,
}

impl<N: ChatNotifier> Dispatcher<N> {
    pub fn new(settings: Arc<NotifySettings>, directory: Directory, notifier: N) -> Self {
        Self {
            settings,
            directory,
            notifier,
        }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Handles a raw webhook `payload` of the given `kind` (the `X-GitHub-Event` header).
    pub async fn dispatch(
        &mut self,
        kind: &str,
        payload: &serde_json::Value,
    ) -> Result<DispatchOutcome, DispatchError> {
        let Some(event_kind) = EventKind::from_header(kind) else {
            return Ok(DispatchOutcome::Unhandled {
                kind: kind.to_string(),
            });
        };
        let event = WebhookEvent::parse(event_kind, payload).map_err(|source| {
            DispatchError::MalformedPayload {
                kind: event_kind,
                source,
            }
        })?;
        self.dispatch_event(&ClassifiedEvent::new(event)).await
    }

    pub async fn dispatch_event(
        &mut self,
        event: &ClassifiedEvent,
    ) -> Result<DispatchOutcome, DispatchError> {
        self.refresh_directory().await;

        if let Some(reason) = skip_reason(event, self.settings.correlation_window) {
            tracing::debug!("Skipping event: {reason}");
            return Ok(DispatchOutcome::Skipped(reason));
        }

        let Some(notification) =
            render(event.event(), self.settings.message_body_limit).into_notification()
        else {
            tracing::warn!(
                "No message for `{}` event with action `{}`",
                event.event().kind(),
                event.action()
            );
            return Ok(DispatchOutcome::NothingToSend);
        };

        let recipients = self.resolve_recipients(event);
        if recipients.is_empty() && self.settings.bot_names.contains(event.sender()) {
            tracing::info!(
                "Nobody wants to be notified about an event from bot `{}`",
                event.sender()
            );
            return Ok(DispatchOutcome::SuppressedNoRecipients);
        }

        self.notifier.post(&notification, &recipients).await?;
        Ok(DispatchOutcome::Dispatched { recipients })
    }

    /// Lark users to mention, deduplicated and in the order in which they were discovered.
    fn resolve_recipients(&self, event: &ClassifiedEvent) -> Vec<LarkUserId> {
        let bot_names = &self.settings.bot_names;
        event
            .involved_users()
            .iter()
            .filter(|(login, _)| !bot_names.contains(login))
            .filter_map(|(login, reasons)| {
                match self
                    .directory
                    .resolve(login, reasons, event.event(), bot_names)
                {
                    Ok(Some(id)) => Some(id.clone()),
                    Ok(None) => {
                        tracing::debug!("User `{login}` is not interested ({reasons:?})");
                        None
                    }
                    Err(error @ DirectoryError::UnknownUser(_)) => {
                        tracing::warn!("{error}");
                        None
                    }
                    Err(error) => {
                        tracing::error!("Cannot resolve user `{login}`: {error:?}");
                        None
                    }
                }
            })
            .unique()
            .collect()
    }

    async fn refresh_directory(&mut self) {
        let Some(interval) = self.settings.directory_reload_interval else {
            return;
        };
        if self.directory.loaded_at().elapsed() < interval {
            return;
        }
        if let Err(error) = self.directory.reload().await {
            tracing::warn!("Cannot reload user directory, keeping the previous one: {error:?}");
        }
    }
}

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tracing::Instrument;

use crate::event_log::EventLog;
use crate::github::ReceivedWebhook;
use crate::lark::ChatNotifier;
use crate::notify::dispatch::{DispatchError, DispatchOutcome, Dispatcher};
use crate::utils::logging::LogError;
use crate::utils::text::pluralize;

pub struct NotifyProcess {
    pub webhook_tx: mpsc::Sender<ReceivedWebhook>,
    pub notify_process: Pin<Box<dyn Future<Output = ()> + Send>>,
}

/// Creates a future with a process that continuously receives webhooks and turns them into
/// notifications, one at a time.
pub fn create_notify_process<N: ChatNotifier + 'static>(
    dispatcher: Dispatcher<N>,
    event_log: Option<EventLog>,
) -> NotifyProcess {
    let (webhook_tx, webhook_rx) = mpsc::channel::<ReceivedWebhook>(1024);

    let service = async move {
        consume_webhooks(dispatcher, event_log, webhook_rx).await;
        tracing::info!("Webhook queue was closed");
    };

    NotifyProcess {
        webhook_tx,
        notify_process: Box::pin(service),
    }
}

async fn consume_webhooks<N: ChatNotifier>(
    mut dispatcher: Dispatcher<N>,
    event_log: Option<EventLog>,
    mut webhook_rx: mpsc::Receiver<ReceivedWebhook>,
) {
    while let Some(webhook) = webhook_rx.recv().await {
        let span = tracing::info_span!(
            "Webhook",
            kind = %webhook.kind,
            action = webhook.action().unwrap_or("unknown")
        );
        tracing::trace!("Received webhook: {webhook:#?}");
        if let Err(error) = handle_webhook(&mut dispatcher, event_log.as_ref(), &webhook)
            .instrument(span.clone())
            .await
        {
            span.log_error(error.into());
        }
    }
}

/// Dispatches a single webhook and records it in the event log, if needed.
pub async fn handle_webhook<N: ChatNotifier>(
    dispatcher: &mut Dispatcher<N>,
    event_log: Option<&EventLog>,
    webhook: &ReceivedWebhook,
) -> Result<DispatchOutcome, DispatchError> {
    let result = dispatcher.dispatch(&webhook.kind, &webhook.payload).await;
    if let Ok(outcome) = &result {
        log_outcome(outcome);
    }

    if let Some(event_log) = event_log.filter(|log| log.should_record(result.is_err())) {
        match event_log.record(webhook).await {
            Ok(path) => tracing::info!("Webhook saved to {}", path.display()),
            Err(error) => tracing::error!("Cannot save webhook: {error:?}"),
        }
    }
    result
}

fn log_outcome(outcome: &DispatchOutcome) {
    match outcome {
        DispatchOutcome::Unhandled { kind } => {
            tracing::debug!("Ignoring `{kind}` event");
        }
        DispatchOutcome::Skipped(reason) => {
            tracing::info!("Notification skipped: {reason}");
        }
        DispatchOutcome::NothingToSend => {}
        DispatchOutcome::SuppressedNoRecipients => {
            tracing::info!("Notification suppressed, no recipients");
        }
        DispatchOutcome::Dispatched { recipients } => {
            tracing::info!(
                "Notified {} {}",
                recipients.len(),
                pluralize("recipient", recipients.len())
            );
        }
    }
}

//! Persists received webhook payloads, so that they can be inspected and replayed later.
use std::path::{Path, PathBuf};

use crate::github::ReceivedWebhook;

#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    #[error("Cannot serialize webhook payload")]
    Serialize(#[from] serde_json::Error),
    #[error("Cannot write event log file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Directory with one folder per `<kind>-<action>`, containing one JSON file per event.
#[derive(Debug, Clone)]
pub struct EventLog {
    dir: PathBuf,
    /// Record every event, not just the failed ones.
    always: bool,
}

impl EventLog {
    pub fn new(dir: impl Into<PathBuf>, always: bool) -> Self {
        Self {
            dir: dir.into(),
            always,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn should_record(&self, failed: bool) -> bool {
        failed || self.always
    }

    /// Writes the payload of `webhook` as pretty JSON and returns the path of the created file.
    pub async fn record(&self, webhook: &ReceivedWebhook) -> Result<PathBuf, EventLogError> {
        let folder = self.dir.join(format!(
            "{}-{}",
            sanitize(&webhook.kind),
            sanitize(webhook.action().unwrap_or("unknown"))
        ));
        tokio::fs::create_dir_all(&folder)
            .await
            .map_err(|source| EventLogError::Io {
                path: folder.clone(),
                source,
            })?;

        let path = folder.join(format!(
            "{}.json",
            webhook.received_at.format("%Y%m%d-%H%M%S%.6f")
        ));
        let content = serde_json::to_string_pretty(&webhook.payload)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| EventLogError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

/// Keeps the header values from escaping the log directory.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

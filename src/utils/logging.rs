use anyhow::Error;
use tracing::span::Span;

pub trait LogError {
    /// Logs a root error of a handler inside the handler's span.
    fn log_error(&self, error: Error);
}

impl LogError for Span {
    fn log_error(&self, error: Error) {
        self.in_scope(|| {
            tracing::error!("Error: {error:?}");
        });
    }
}

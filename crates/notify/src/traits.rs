//! Event persistence seam and shared error types.

use vigil_core::AlertEvent;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("template rendering failed: {0}")]
    Template(String),

    #[error("event persistence failed: {0}")]
    Store(String),
}

/// Append-only persistence for emitted alert events.
///
/// The server crate implements this over the relational store; tests use
/// an in-memory recorder.
#[async_trait::async_trait]
pub trait EventStore: Send + Sync {
    async fn insert(&self, event: &AlertEvent) -> Result<(), NotifyError>;
}

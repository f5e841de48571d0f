//! Inbound source port: the trigger side of the transport.
//!
//! A source hands out batches of pending messages. Each message is then
//! settled exactly once: completed when its invocation was handled, or
//! abandoned so the transport delivers it again.

use crate::relay::domain::InboundMessage;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for inbound source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// A named queue that delivers messages to the relay.
#[async_trait]
pub trait InboundSource: Send + Sync {
    /// Returns the source name used in logs.
    fn name(&self) -> &str;

    /// Takes up to `max` pending messages.
    ///
    /// Returns an empty batch when nothing is pending.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the transport cannot be read.
    async fn receive_batch(&self, max: usize) -> SourceResult<Vec<InboundMessage>>;

    /// Settles a message whose invocation was handled.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::UnknownMessage`] when the message is not
    /// outstanding, or [`SourceError::Transport`] on transport failure.
    async fn complete(&self, message: &InboundMessage) -> SourceResult<()>;

    /// Releases a message so it is delivered again.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::UnknownMessage`] when the message is not
    /// outstanding, or [`SourceError::Transport`] on transport failure.
    async fn abandon(&self, message: &InboundMessage) -> SourceResult<()>;
}

/// Errors returned by inbound source implementations.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The message is not outstanding on this source.
    #[error("message {0} is not outstanding")]
    UnknownMessage(String),

    /// Transport-layer failure.
    #[error("source transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl SourceError {
    /// Wraps a transport error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}

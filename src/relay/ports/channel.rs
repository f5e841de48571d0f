//! Outbound channel port: one send operation per message.

use crate::relay::domain::{DocumentError, OutboundMessage};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for outbound sends.
pub type PublishResult<T> = Result<T, PublishError>;

/// A named destination that accepts messages.
#[async_trait]
pub trait OutboundChannel: Send + Sync {
    /// Returns the channel name used in logs and error messages.
    fn name(&self) -> &str;

    /// Sends one message.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Unreachable`] when the destination cannot be
    /// reached, [`PublishError::Rejected`] when it refuses the message, and
    /// [`PublishError::Transport`] for adapter-specific failures.
    async fn send(&self, message: OutboundMessage) -> PublishResult<()>;
}

/// Errors returned while publishing to a channel.
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    /// The destination could not be reached.
    #[error("channel {channel} is unreachable: {reason}")]
    Unreachable {
        /// Channel name.
        channel: String,
        /// Reason string.
        reason: String,
    },

    /// The destination refused the message.
    #[error("channel {channel} rejected the message: {reason}")]
    Rejected {
        /// Channel name.
        channel: String,
        /// Reason string.
        reason: String,
    },

    /// The document could not be serialized for sending.
    #[error(transparent)]
    Serialization(#[from] DocumentError),

    /// Transport-layer failure.
    #[error("transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl PublishError {
    /// Creates an [`PublishError::Unreachable`] error.
    pub fn unreachable(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unreachable {
            channel: channel.into(),
            reason: reason.into(),
        }
    }

    /// Creates a [`PublishError::Rejected`] error.
    pub fn rejected(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            channel: channel.into(),
            reason: reason.into(),
        }
    }

    /// Wraps a transport error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}

//! In-memory outbound channel with failure injection.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::relay::{
    domain::OutboundMessage,
    ports::{OutboundChannel, PublishError, PublishResult},
};

/// Failure an [`InMemoryChannel`] reports instead of accepting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelFailure {
    /// Sends fail with [`PublishError::Unreachable`].
    Unreachable,
    /// Sends fail with [`PublishError::Rejected`].
    Rejecting,
}

/// Thread-safe in-memory channel that records every accepted message.
///
/// Clones share the same recorded messages.
#[derive(Debug, Clone)]
pub struct InMemoryChannel {
    name: String,
    state: Arc<RwLock<ChannelState>>,
}

#[derive(Debug, Default)]
struct ChannelState {
    sent: Vec<OutboundMessage>,
    failure: Option<ChannelFailure>,
    attempts: usize,
}

impl InMemoryChannel {
    /// Creates an empty channel.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::default(),
        }
    }

    /// Creates a channel whose sends always fail with `failure`.
    #[must_use]
    pub fn failing(name: impl Into<String>, failure: ChannelFailure) -> Self {
        let channel = Self::new(name);
        channel.set_failure(Some(failure));
        channel
    }

    /// Makes later sends fail, or succeed again with `None`.
    pub fn set_failure(&self, failure: Option<ChannelFailure>) {
        if let Ok(mut state) = self.state.write() {
            state.failure = failure;
        }
    }

    /// Returns the accepted messages in send order.
    #[must_use]
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.state
            .read()
            .map(|state| state.sent.clone())
            .unwrap_or_default()
    }

    /// Returns how many sends were attempted, failed ones included.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.state.read().map(|state| state.attempts).unwrap_or_default()
    }
}

#[async_trait]
impl OutboundChannel for InMemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: OutboundMessage) -> PublishResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|err| PublishError::transport(std::io::Error::other(err.to_string())))?;
        state.attempts += 1;
        match state.failure {
            Some(ChannelFailure::Unreachable) => {
                Err(PublishError::unreachable(&self.name, "channel is offline"))
            }
            Some(ChannelFailure::Rejecting) => {
                Err(PublishError::rejected(&self.name, "channel refused the message"))
            }
            None => {
                state.sent.push(message);
                Ok(())
            }
        }
    }
}

//! In-memory inbound source.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::relay::{
    domain::{InboundMessage, MessageMetadata},
    ports::{InboundSource, SourceError, SourceResult},
};

/// Thread-safe in-memory queue of inbound messages.
///
/// Abandoned messages go back to the front of the queue with their
/// delivery count incremented.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    name: String,
    state: Arc<Mutex<SourceState>>,
}

#[derive(Debug, Default)]
struct SourceState {
    pending: VecDeque<InboundMessage>,
    outstanding: HashMap<String, InboundMessage>,
    completed: Vec<String>,
}

impl InMemorySource {
    /// Creates an empty source.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::default(),
        }
    }

    /// Queues a message.
    pub fn push(&self, message: InboundMessage) {
        if let Ok(mut state) = self.state.lock() {
            state.pending.push_back(message);
        }
    }

    /// Queues a body under a fresh message id and returns the id.
    pub fn push_body(&self, body: impl Into<String>) -> String {
        let message_id = Uuid::new_v4().to_string();
        self.push(InboundMessage::new(body, MessageMetadata::new(message_id.clone())));
        message_id
    }

    /// Returns the number of messages waiting for delivery.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.lock().map(|state| state.pending.len()).unwrap_or_default()
    }

    /// Returns the number of delivered but unsettled messages.
    #[must_use]
    pub fn outstanding_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.outstanding.len())
            .unwrap_or_default()
    }

    /// Returns the ids of completed messages in completion order.
    #[must_use]
    pub fn completed(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|state| state.completed.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> SourceResult<MutexGuard<'_, SourceState>> {
        self.state
            .lock()
            .map_err(|err| SourceError::transport(std::io::Error::other(err.to_string())))
    }
}

#[async_trait]
impl InboundSource for InMemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive_batch(&self, max: usize) -> SourceResult<Vec<InboundMessage>> {
        let mut state = self.lock()?;
        let mut batch = Vec::new();
        while batch.len() < max {
            let Some(message) = state.pending.pop_front() else {
                break;
            };
            state
                .outstanding
                .insert(message.message_id().to_owned(), message.clone());
            batch.push(message);
        }
        Ok(batch)
    }

    async fn complete(&self, message: &InboundMessage) -> SourceResult<()> {
        let mut state = self.lock()?;
        let id = message.message_id();
        if state.outstanding.remove(id).is_none() {
            return Err(SourceError::UnknownMessage(id.to_owned()));
        }
        state.completed.push(id.to_owned());
        Ok(())
    }

    async fn abandon(&self, message: &InboundMessage) -> SourceResult<()> {
        let mut state = self.lock()?;
        let id = message.message_id();
        let Some(outstanding) = state.outstanding.remove(id) else {
            return Err(SourceError::UnknownMessage(id.to_owned()));
        };
        let metadata = outstanding.metadata().clone();
        let delivery_count = metadata.delivery_count().saturating_add(1);
        let redelivery = InboundMessage::new(
            outstanding.body(),
            metadata.with_delivery_count(delivery_count),
        );
        state.pending.push_front(redelivery);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::{Result, ensure};
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn batches_are_bounded_and_ordered() -> Result<()> {
        let source = InMemorySource::new("in");
        for body in ["<a/>", "<b/>", "<c/>"] {
            source.push_body(body);
        }

        let first = source.receive_batch(2).await?;
        let second = source.receive_batch(2).await?;

        let bodies: Vec<&str> = first.iter().chain(&second).map(InboundMessage::body).collect();
        ensure!(bodies == vec!["<a/>", "<b/>", "<c/>"]);
        ensure!(source.outstanding_count() == 3);
        ensure!(source.pending_count() == 0);
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn complete_settles_once() -> Result<()> {
        let source = InMemorySource::new("in");
        let id = source.push_body("<a/>");
        let batch = source.receive_batch(10).await?;
        let message = batch.first().ok_or_else(|| eyre::eyre!("message expected"))?;

        source.complete(message).await?;
        let again = source.complete(message).await;

        ensure!(source.completed() == vec![id]);
        ensure!(matches!(again, Err(SourceError::UnknownMessage(_))));
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn abandoned_messages_are_redelivered() -> Result<()> {
        let source = InMemorySource::new("in");
        source.push_body("<a/>");
        let batch = source.receive_batch(1).await?;
        let message = batch.first().ok_or_else(|| eyre::eyre!("message expected"))?;

        source.abandon(message).await?;
        let redelivered = source.receive_batch(1).await?;

        let again = redelivered
            .first()
            .ok_or_else(|| eyre::eyre!("message expected"))?;
        ensure!(again.message_id() == message.message_id());
        ensure!(again.metadata().delivery_count() == 2);
        Ok(())
    }
}

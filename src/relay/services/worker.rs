//! Drives invocations from an inbound source.
//!
//! Each received message runs as its own Tokio task; a semaphore bounds how
//! many are in flight. Handled messages are completed, re-raised ones are
//! abandoned so the transport delivers them again.

use super::processor::{InvocationOutcome, MessageHandler};
use crate::relay::{
    domain::InboundMessage,
    ports::{InboundSource, SourceError},
};
use std::future::Future;
use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Errors that stop the worker.
#[derive(Debug, Clone, Error)]
pub enum WorkerError {
    /// The inbound source could not be read.
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Counts of what happened to the messages of one or more drains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Messages received from the source.
    pub received: usize,
    /// Messages whose transformed document was published.
    pub published: usize,
    /// Failed messages handled through the error channel.
    pub error_routed: usize,
    /// Error-routed messages whose error record was not delivered.
    pub records_lost: usize,
    /// Failed messages returned to the source for redelivery.
    pub abandoned: usize,
    /// Messages that could not be settled with the source.
    pub unsettled: usize,
}

impl DrainReport {
    fn record(&mut self, settlement: Settlement) {
        match settlement {
            Settlement::Completed(InvocationOutcome::Published) => self.published += 1,
            Settlement::Completed(InvocationOutcome::ErrorRouted { record_delivered }) => {
                self.error_routed += 1;
                if !record_delivered {
                    self.records_lost += 1;
                }
            }
            Settlement::Abandoned => self.abandoned += 1,
        }
    }
}

impl AddAssign for DrainReport {
    fn add_assign(&mut self, other: Self) {
        self.received += other.received;
        self.published += other.published;
        self.error_routed += other.error_routed;
        self.records_lost += other.records_lost;
        self.abandoned += other.abandoned;
        self.unsettled += other.unsettled;
    }
}

#[derive(Debug, Clone, Copy)]
enum Settlement {
    Completed(InvocationOutcome),
    Abandoned,
}

/// Pulls messages from a source and hands each to a [`MessageHandler`].
pub struct RelayWorker<S, H>
where
    S: InboundSource + 'static,
    H: MessageHandler + 'static,
{
    source: Arc<S>,
    handler: Arc<H>,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
}

impl<S, H> RelayWorker<S, H>
where
    S: InboundSource + 'static,
    H: MessageHandler + 'static,
{
    /// Creates a worker running at most `max_in_flight` invocations at once.
    ///
    /// A bound of zero is raised to one.
    #[must_use]
    pub fn new(source: Arc<S>, handler: Arc<H>, max_in_flight: usize) -> Self {
        let bound = max_in_flight.max(1);
        Self {
            source,
            handler,
            permits: Arc::new(Semaphore::new(bound)),
            max_in_flight: bound,
        }
    }

    /// Receives one batch and runs every message in it to settlement.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Source`] when the batch cannot be received.
    /// Settlement failures are logged and counted as `unsettled`.
    pub async fn drain_once(&self) -> Result<DrainReport, WorkerError> {
        let batch = self.source.receive_batch(self.max_in_flight).await?;
        let mut report = DrainReport {
            received: batch.len(),
            ..DrainReport::default()
        };
        if batch.is_empty() {
            return Ok(report);
        }
        debug!(source = self.source.name(), messages = batch.len(), "batch received");

        let mut tasks = JoinSet::new();
        for message in batch {
            let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                break;
            };
            let source = Arc::clone(&self.source);
            let handler = Arc::clone(&self.handler);
            tasks.spawn(async move {
                let _permit = permit;
                settle(source.as_ref(), handler.as_ref(), message).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(settlement)) => report.record(settlement),
                Ok(Err(err)) => {
                    error!(error = %err, "message could not be settled");
                    report.unsettled += 1;
                }
                Err(err) => {
                    error!(error = %err, "invocation task failed");
                    report.unsettled += 1;
                }
            }
        }
        Ok(report)
    }

    /// Drains batches until the source is empty.
    ///
    /// Stops early after a batch in which any message was abandoned or left
    /// unsettled, so a message that keeps failing is retried on the next
    /// poll rather than in a tight loop.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Source`] when a batch cannot be received.
    pub async fn drain(&self) -> Result<DrainReport, WorkerError> {
        let mut total = DrainReport::default();
        loop {
            let report = self.drain_once().await?;
            total += report;
            if report.received == 0 || report.abandoned > 0 || report.unsettled > 0 {
                return Ok(total);
            }
        }
    }

    /// Drains the source every `poll_interval` until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Source`] when a batch cannot be received.
    pub async fn run(
        &self,
        poll_interval: Duration,
        shutdown: impl Future<Output = ()>,
    ) -> Result<DrainReport, WorkerError> {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut total = DrainReport::default();
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!(
                        published = total.published,
                        error_routed = total.error_routed,
                        abandoned = total.abandoned,
                        "worker stopping"
                    );
                    return Ok(total);
                }
                _ = ticker.tick() => {
                    total += self.drain().await?;
                }
            }
        }
    }
}

async fn settle<S, H>(
    source: &S,
    handler: &H,
    message: InboundMessage,
) -> Result<Settlement, SourceError>
where
    S: InboundSource,
    H: MessageHandler,
{
    match handler.handle(&message).await {
        Ok(outcome) => {
            source.complete(&message).await?;
            Ok(Settlement::Completed(outcome))
        }
        Err(err) => {
            warn!(
                message_id = message.message_id(),
                error = %err,
                "message abandoned for redelivery"
            );
            source.abandon(&message).await?;
            Ok(Settlement::Abandoned)
        }
    }
}

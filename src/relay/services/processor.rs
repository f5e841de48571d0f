//! Per-message processing: validate, transform, route.

use super::router::{ErrorPolicy, FailureRoute, Router};
use crate::relay::{
    domain::{InboundMessage, Invocation, InvocationError, InvocationState, ValidationError},
    ports::{DocumentValidator, OutboundChannel, PublishError},
    transform::transform,
};
use async_trait::async_trait;
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{Instrument, info, info_span, warn};

/// Errors that fail an invocation.
///
/// The `Display` output is what an error record carries as its
/// `ErrorMessage` property.
#[derive(Debug, Clone, Error)]
pub enum ProcessingError {
    /// The payload is malformed or breaks the schema.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The transformed document could not be published.
    #[error(transparent)]
    Publish(#[from] PublishError),
    /// The state machine was driven along an edge it does not have.
    #[error(transparent)]
    Invocation(#[from] InvocationError),
}

/// Result type for invocation handling.
pub type ProcessingResult<T> = Result<T, ProcessingError>;

/// Successful end of an invocation. The inbound message should be settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// The transformed document reached the output channel.
    Published,
    /// The invocation failed and was handled by the error channel.
    ErrorRouted {
        /// Whether the error channel accepted the error record.
        record_delivered: bool,
    },
}

/// The inbound trigger: invoked once per delivered message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Processes one message.
    ///
    /// `Ok` means the message is handled and may be settled; `Err` means
    /// the runtime should redeliver or dead-letter it.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError`] when the invocation failed and the
    /// failure policy re-raises.
    async fn handle(&self, message: &InboundMessage) -> ProcessingResult<InvocationOutcome>;
}

/// The relay stage: an immutable context shared by every invocation.
pub struct XmlRelayProcessor<V, O, E, C>
where
    V: DocumentValidator,
    O: OutboundChannel,
    E: OutboundChannel,
    C: Clock + Send + Sync,
{
    validator: Arc<V>,
    router: Router<O, E, C>,
    target_namespace: String,
    clock: Arc<C>,
}

impl<V, O, E, C> XmlRelayProcessor<V, O, E, C>
where
    V: DocumentValidator,
    O: OutboundChannel,
    E: OutboundChannel,
    C: Clock + Send + Sync,
{
    /// Creates a processor that moves valid documents into
    /// `target_namespace`.
    #[must_use]
    pub fn new(
        validator: Arc<V>,
        output: Arc<O>,
        policy: ErrorPolicy<E>,
        target_namespace: impl Into<String>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            validator,
            router: Router::new(output, policy, Arc::clone(&clock)),
            target_namespace: target_namespace.into(),
            clock,
        }
    }

    /// Returns the namespace documents are moved into.
    #[must_use]
    pub fn target_namespace(&self) -> &str {
        &self.target_namespace
    }

    /// Returns the router.
    #[must_use]
    pub const fn router(&self) -> &Router<O, E, C> {
        &self.router
    }

    /// Runs one invocation to a terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError`] in fail-closed mode when any stage
    /// fails, and in either mode when the state machine is misused.
    pub async fn handle(&self, message: &InboundMessage) -> ProcessingResult<InvocationOutcome> {
        let span = info_span!(
            "invocation",
            message_id = %message.message_id(),
            delivery_count = message.metadata().delivery_count(),
        );
        self.run(message).instrument(span).await
    }

    async fn run(&self, message: &InboundMessage) -> ProcessingResult<InvocationOutcome> {
        let mut invocation = Invocation::start(message.message_id(), &*self.clock);
        match self.process(&mut invocation, message.body()).await {
            Ok(()) => {
                invocation.transition_to(InvocationState::Done)?;
                info!(namespace = %self.target_namespace, "message published");
                Ok(InvocationOutcome::Published)
            }
            Err(err @ ProcessingError::Invocation(_)) => Err(err),
            Err(err) => self.fail(&mut invocation, message, err).await,
        }
    }

    async fn process(&self, invocation: &mut Invocation, body: &str) -> ProcessingResult<()> {
        invocation.transition_to(InvocationState::Validating)?;
        let document = self.validator.validate(body)?;

        invocation.transition_to(InvocationState::Transforming)?;
        let transformed = transform(document, &self.target_namespace);

        invocation.transition_to(InvocationState::Publishing)?;
        self.router.publish(&transformed).await?;
        Ok(())
    }

    async fn fail(
        &self,
        invocation: &mut Invocation,
        message: &InboundMessage,
        err: ProcessingError,
    ) -> ProcessingResult<InvocationOutcome> {
        let failed_in = invocation.state();
        invocation.transition_to(InvocationState::Failed)?;
        let error_message = err.to_string();

        match self.router.route_failure(message.body(), &error_message).await {
            FailureRoute::ErrorRouted { delivered } => {
                invocation.transition_to(InvocationState::ErrorRouted)?;
                info!(
                    stage = %failed_in,
                    error = %error_message,
                    record_delivered = delivered,
                    "message routed to error channel"
                );
                Ok(InvocationOutcome::ErrorRouted {
                    record_delivered: delivered,
                })
            }
            FailureRoute::Reraise => {
                invocation.transition_to(InvocationState::Reraised)?;
                warn!(stage = %failed_in, error = %error_message, "invocation failed");
                Err(err)
            }
        }
    }
}

#[async_trait]
impl<V, O, E, C> MessageHandler for XmlRelayProcessor<V, O, E, C>
where
    V: DocumentValidator,
    O: OutboundChannel,
    E: OutboundChannel,
    C: Clock + Send + Sync,
{
    async fn handle(&self, message: &InboundMessage) -> ProcessingResult<InvocationOutcome> {
        Self::handle(self, message).await
    }
}

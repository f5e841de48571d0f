//! Router: publishes successes and applies the failure policy.

use crate::relay::{
    domain::{ErrorRecord, OutboundMessage, TransformedDocument},
    ports::{OutboundChannel, PublishResult},
};
use mockable::Clock;
use std::fmt;
use std::sync::Arc;
use tracing::error;

/// What happens to a message whose invocation failed.
///
/// Chosen once at startup: configuring an error channel selects
/// [`ErrorPolicy::RouteToErrorChannel`].
pub enum ErrorPolicy<E> {
    /// Fail-open: send an error record to the channel and treat the
    /// invocation as handled.
    RouteToErrorChannel(Arc<E>),
    /// Fail-closed: route nothing and return the error to the runtime.
    Propagate,
}

impl<E> Clone for ErrorPolicy<E> {
    fn clone(&self) -> Self {
        match self {
            Self::RouteToErrorChannel(channel) => Self::RouteToErrorChannel(Arc::clone(channel)),
            Self::Propagate => Self::Propagate,
        }
    }
}

impl<E: OutboundChannel> fmt::Debug for ErrorPolicy<E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RouteToErrorChannel(channel) => formatter
                .debug_tuple("RouteToErrorChannel")
                .field(&channel.name())
                .finish(),
            Self::Propagate => formatter.write_str("Propagate"),
        }
    }
}

impl<E> ErrorPolicy<E> {
    /// Returns `true` for the fail-open policy.
    #[must_use]
    pub const fn is_fail_open(&self) -> bool {
        matches!(self, Self::RouteToErrorChannel(_))
    }
}

/// How a failure was dealt with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureRoute {
    /// An error record was offered to the error channel.
    ErrorRouted {
        /// Whether the error channel accepted the record.
        delivered: bool,
    },
    /// The caller must return the error to the runtime.
    Reraise,
}

/// Sends transformed documents to the output channel and failures wherever
/// the [`ErrorPolicy`] says.
pub struct Router<O, E, C>
where
    O: OutboundChannel,
    E: OutboundChannel,
    C: Clock + Send + Sync,
{
    output: Arc<O>,
    policy: ErrorPolicy<E>,
    clock: Arc<C>,
}

impl<O, E, C> Router<O, E, C>
where
    O: OutboundChannel,
    E: OutboundChannel,
    C: Clock + Send + Sync,
{
    /// Creates a router.
    #[must_use]
    pub const fn new(output: Arc<O>, policy: ErrorPolicy<E>, clock: Arc<C>) -> Self {
        Self {
            output,
            policy,
            clock,
        }
    }

    /// Returns the configured failure policy.
    #[must_use]
    pub const fn policy(&self) -> &ErrorPolicy<E> {
        &self.policy
    }

    /// Serializes `document` compactly and sends it to the output channel.
    ///
    /// # Errors
    ///
    /// Returns [`crate::relay::ports::PublishError`] when serialization or
    /// the send fails.
    pub async fn publish(&self, document: &TransformedDocument) -> PublishResult<()> {
        let body = document.to_xml_string()?;
        self.output.send(OutboundMessage::new(body)).await
    }

    /// Applies the failure policy to a failed invocation.
    ///
    /// In fail-open mode a failed send to the error channel is logged and
    /// not retried; the message is then lost.
    pub async fn route_failure(&self, original_payload: &str, error_message: &str) -> FailureRoute {
        let ErrorPolicy::RouteToErrorChannel(channel) = &self.policy else {
            return FailureRoute::Reraise;
        };
        let record = ErrorRecord::new(original_payload, error_message, &*self.clock);
        match channel.send(record.into_outbound()).await {
            Ok(()) => FailureRoute::ErrorRouted { delivered: true },
            Err(err) => {
                error!(
                    channel = channel.name(),
                    error = %err,
                    failure = error_message,
                    "error record could not be delivered; message dropped"
                );
                FailureRoute::ErrorRouted { delivered: false }
            }
        }
    }
}

//! Per-message invocation state machine.

use super::{InvocationError, ParseInvocationStateError};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a single message invocation.
///
/// ```text
/// Received -> Validating -> Transforming -> Publishing -> Done
///                  |              |              |
///                  +--------------+--------------+--> Failed -> ErrorRouted
///                                                            \-> Reraised
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    /// The message has been delivered and not yet inspected.
    Received,
    /// The payload is being checked against the schema.
    Validating,
    /// The namespace is being rewritten.
    Transforming,
    /// The transformed document is being sent to the output channel.
    Publishing,
    /// The transformed document was published.
    Done,
    /// A stage failed; the error policy decides what happens next.
    Failed,
    /// The failure was handed to the error channel.
    ErrorRouted,
    /// The failure was returned to the invoking runtime.
    Reraised,
}

impl InvocationState {
    /// Returns the canonical representation used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validating => "validating",
            Self::Transforming => "transforming",
            Self::Publishing => "publishing",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::ErrorRouted => "error_routed",
            Self::Reraised => "reraised",
        }
    }

    /// Returns whether transition to `target` is an edge of the machine.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Received, Self::Validating)
                | (Self::Validating, Self::Transforming)
                | (Self::Transforming, Self::Publishing)
                | (Self::Publishing, Self::Done)
                | (
                    Self::Validating | Self::Transforming | Self::Publishing,
                    Self::Failed
                )
                | (Self::Failed, Self::ErrorRouted | Self::Reraised)
        )
    }

    /// Returns whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::ErrorRouted | Self::Reraised)
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for InvocationState {
    type Error = ParseInvocationStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "received" => Ok(Self::Received),
            "validating" => Ok(Self::Validating),
            "transforming" => Ok(Self::Transforming),
            "publishing" => Ok(Self::Publishing),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            "error_routed" => Ok(Self::ErrorRouted),
            "reraised" => Ok(Self::Reraised),
            _ => Err(ParseInvocationStateError(value.to_owned())),
        }
    }
}

/// Tracks one message through the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    message_id: String,
    state: InvocationState,
    started_at: DateTime<Utc>,
}

impl Invocation {
    /// Starts an invocation in [`InvocationState::Received`].
    #[must_use]
    pub fn start(message_id: impl Into<String>, clock: &impl Clock) -> Self {
        Self {
            message_id: message_id.into(),
            state: InvocationState::Received,
            started_at: clock.utc(),
        }
    }

    /// Returns the message identifier.
    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> InvocationState {
        self.state
    }

    /// Returns when the invocation started.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Moves to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::InvalidTransition`] and leaves the state
    /// unchanged when `target` is not reachable from the current state.
    pub fn transition_to(&mut self, target: InvocationState) -> Result<(), InvocationError> {
        if !self.state.can_transition_to(target) {
            return Err(InvocationError::InvalidTransition {
                message_id: self.message_id.clone(),
                from: self.state,
                to: target,
            });
        }
        tracing::debug!(
            message_id = %self.message_id,
            from = %self.state,
            to = %target,
            "invocation state changed"
        );
        self.state = target;
        Ok(())
    }
}

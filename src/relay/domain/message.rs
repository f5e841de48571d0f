//! Messages exchanged with the transport.

use chrono::{DateTime, SecondsFormat, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property carrying the failure description on error-channel messages.
pub const ERROR_MESSAGE_PROPERTY: &str = "ErrorMessage";

/// Property carrying the failure time on error-channel messages.
pub const TIMESTAMP_PROPERTY: &str = "Timestamp";

/// Transport-supplied metadata of an inbound message.
///
/// None of it affects processing; it is carried for log correlation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    message_id: String,
    delivery_count: u32,
    enqueued_at: Option<DateTime<Utc>>,
}

impl MessageMetadata {
    /// Creates metadata for a first delivery.
    #[must_use]
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            delivery_count: 1,
            enqueued_at: None,
        }
    }

    /// Sets the delivery count reported by the transport.
    #[must_use]
    pub const fn with_delivery_count(mut self, delivery_count: u32) -> Self {
        self.delivery_count = delivery_count;
        self
    }

    /// Sets the enqueue time reported by the transport.
    #[must_use]
    pub const fn with_enqueued_at(mut self, enqueued_at: DateTime<Utc>) -> Self {
        self.enqueued_at = Some(enqueued_at);
        self
    }

    /// Returns the transport message identifier.
    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Returns how many times the transport has delivered this message.
    #[must_use]
    pub const fn delivery_count(&self) -> u32 {
        self.delivery_count
    }

    /// Returns when the message was enqueued, if known.
    #[must_use]
    pub const fn enqueued_at(&self) -> Option<DateTime<Utc>> {
        self.enqueued_at
    }
}

/// A message delivered from the input channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    body: String,
    metadata: MessageMetadata,
}

impl InboundMessage {
    /// Creates an inbound message.
    #[must_use]
    pub fn new(body: impl Into<String>, metadata: MessageMetadata) -> Self {
        Self {
            body: body.into(),
            metadata,
        }
    }

    /// Returns the raw payload.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the transport metadata.
    #[must_use]
    pub const fn metadata(&self) -> &MessageMetadata {
        &self.metadata
    }

    /// Shorthand for the transport message identifier.
    #[must_use]
    pub fn message_id(&self) -> &str {
        self.metadata.message_id()
    }
}

/// A message sent to an output or error channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    body: String,
    properties: BTreeMap<String, String>,
}

impl OutboundMessage {
    /// Creates a message with no properties.
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Adds an application property.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Returns the body text.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the application properties.
    #[must_use]
    pub const fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Looks up a property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

/// Diagnostic record sent to the error channel in fail-open mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    original_payload: String,
    error_message: String,
    timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    /// Records a failure of `original_payload`, stamped with the clock's UTC time.
    #[must_use]
    pub fn new(
        original_payload: impl Into<String>,
        error_message: impl Into<String>,
        clock: &impl Clock,
    ) -> Self {
        Self {
            original_payload: original_payload.into(),
            error_message: error_message.into(),
            timestamp: clock.utc(),
        }
    }

    /// Returns the untransformed input, verbatim.
    #[must_use]
    pub fn original_payload(&self) -> &str {
        &self.original_payload
    }

    /// Returns the failure description.
    #[must_use]
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    /// Returns the failure time.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Converts the record to its wire form: the original payload as body,
    /// with `ErrorMessage` and `Timestamp` (RFC 3339, UTC, `Z` suffix)
    /// properties.
    #[must_use]
    pub fn into_outbound(self) -> OutboundMessage {
        let timestamp = self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        OutboundMessage::new(self.original_payload)
            .with_property(ERROR_MESSAGE_PROPERTY, self.error_message)
            .with_property(TIMESTAMP_PROPERTY, timestamp)
    }
}

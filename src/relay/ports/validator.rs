//! Validator port for inbound payloads.

use crate::relay::domain::{Document, ValidationError};

/// Checks a raw payload against the configured schema.
///
/// Implementations are stateless between calls and safe to share across
/// concurrent invocations.
pub trait DocumentValidator: Send + Sync {
    /// Parses and validates `xml`, returning the parsed tree on success so
    /// later stages need not parse again.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Malformed`] when the payload is not
    /// well-formed and [`ValidationError::SchemaViolation`] when it breaks the
    /// schema.
    fn validate(&self, xml: &str) -> Result<Document, ValidationError>;
}

//! Domain error types for per-message processing.
//!
//! Uses `thiserror` for typed variants that callers can inspect; the
//! `Display` output of each variant is what ends up in the `ErrorMessage`
//! property of an error record.

use super::InvocationState;
use std::fmt;
use thiserror::Error;

/// Errors raised while reading or writing a [`super::Document`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    /// The input is not well-formed XML.
    #[error("{0}")]
    Malformed(String),

    /// The document could not be written.
    #[error("failed to write XML: {0}")]
    Write(String),
}

/// Severity of a schema diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Reported but does not fail validation.
    Warning,
    /// Fails validation.
    Error,
}

impl Severity {
    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A single finding raised while checking a document against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    severity: Severity,
    path: String,
    message: String,
}

impl Diagnostic {
    /// Creates an error-severity diagnostic.
    #[must_use]
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a warning-severity diagnostic.
    #[must_use]
    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns the severity.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Returns the element path the diagnostic was raised at, e.g. `/record/id`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.path, self.message)
    }
}

/// Errors that fail validation of an inbound payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The payload is not well-formed XML.
    #[error("malformed XML: {0}")]
    Malformed(String),

    /// The payload violates the schema. Holds every error-severity
    /// diagnostic found in the validation pass; never empty.
    #[error("XML validation error: {}", format_diagnostics(.0))]
    SchemaViolation(Vec<Diagnostic>),
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    /// Returns the diagnostics of a schema violation.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::SchemaViolation(diagnostics) => diagnostics,
            Self::Malformed(_) => &[],
        }
    }

    /// Returns `true` for [`ValidationError::Malformed`].
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

impl From<DocumentError> for ValidationError {
    fn from(err: DocumentError) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Errors raised by the per-invocation state machine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvocationError {
    /// The requested transition is not an edge of the state machine.
    #[error("invalid invocation transition for message {message_id}: {from} -> {to}")]
    InvalidTransition {
        /// Message being processed.
        message_id: String,
        /// Current state.
        from: InvocationState,
        /// Requested state.
        to: InvocationState,
    },
}

/// Error returned while parsing an invocation state name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown invocation state: {0}")]
pub struct ParseInvocationStateError(pub String);

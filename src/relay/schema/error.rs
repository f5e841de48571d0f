//! Errors raised while loading a schema.

use camino::Utf8PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while reading or compiling an XSD file.
///
/// Every variant is fatal at startup: a stage with a schema it cannot fully
/// understand refuses to process messages rather than accepting documents
/// the schema would reject.
#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    /// The schema file could not be read.
    #[error("failed to read schema file {path}: {source}")]
    Io {
        /// Location of the schema file.
        path: Utf8PathBuf,
        /// Underlying filesystem error.
        source: Arc<std::io::Error>,
    },

    /// The schema file is not well-formed XML.
    #[error("schema is not well-formed XML: {0}")]
    Malformed(String),

    /// The document element is not `xs:schema`.
    #[error("document element is {found}, expected xs:schema")]
    NotASchema {
        /// Name of the document element found.
        found: String,
    },

    /// The schema's `targetNamespace` differs from the configured binding.
    #[error("schema targetNamespace is {}, expected {expected}", .found.as_deref().unwrap_or("absent"))]
    NamespaceMismatch {
        /// Namespace the stage is configured for.
        expected: String,
        /// Namespace declared by the schema.
        found: Option<String>,
    },

    /// The schema uses a construct outside the supported subset.
    #[error("unsupported schema construct: {construct}")]
    Unsupported {
        /// Description of the construct.
        construct: String,
    },

    /// A schema component lacks a required attribute.
    #[error("xs:{component} is missing required attribute '{attribute}'")]
    MissingAttribute {
        /// Local name of the schema component.
        component: String,
        /// Attribute that is missing.
        attribute: &'static str,
    },

    /// A schema attribute has a value outside its allowed set.
    #[error("invalid value '{value}' for attribute '{attribute}' of xs:{component}")]
    InvalidAttribute {
        /// Local name of the schema component.
        component: String,
        /// Attribute carrying the value.
        attribute: &'static str,
        /// Offending value.
        value: String,
    },

    /// A reference names a component that does not exist.
    #[error("unresolved {kind} reference: {name}")]
    Unresolved {
        /// Kind of component (`type`, `element`, `attribute`, `prefix`).
        kind: &'static str,
        /// Name as written in the schema.
        name: String,
    },

    /// Two global components share a name.
    #[error("duplicate global {kind} declaration: {name}")]
    Duplicate {
        /// Kind of component.
        kind: &'static str,
        /// Qualified name of the component.
        name: String,
    },

    /// A facet value is invalid or does not apply to its base type.
    #[error("invalid facet xs:{facet}: {reason}")]
    InvalidFacet {
        /// Local name of the facet.
        facet: String,
        /// Why the facet was rejected.
        reason: String,
    },

    /// A simple type derives from itself.
    #[error("circular type derivation through {0}")]
    CircularDerivation(String),

    /// A content model expands beyond the matcher's state limit.
    #[error("content model of {context} is too large ({states} states, limit {limit})")]
    ContentModelTooLarge {
        /// Where the content model is declared.
        context: String,
        /// Number of states required.
        states: usize,
        /// Maximum number of states allowed.
        limit: usize,
    },
}

impl SchemaError {
    /// Creates an [`SchemaError::Unsupported`] error.
    #[must_use]
    pub fn unsupported(construct: impl Into<String>) -> Self {
        Self::Unsupported {
            construct: construct.into(),
        }
    }

    pub(crate) fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn invalid_facet(facet: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFacet {
            facet: facet.into(),
            reason: reason.into(),
        }
    }
}

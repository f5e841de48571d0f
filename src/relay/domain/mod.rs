//! Domain types for the relay stage.
//!
//! Pure types with no infrastructure dependencies: the document tree, the
//! messages exchanged with the transport, the invocation state machine and
//! the per-message error taxonomy.

mod document;
mod error;
mod invocation;
mod message;

pub use document::{
    Attribute, Document, Element, ElementId, Node, QName, Walk, XML_NAMESPACE,
};
pub use error::{
    Diagnostic, DocumentError, InvocationError, ParseInvocationStateError, Severity,
    ValidationError,
};
pub use invocation::{Invocation, InvocationState};
pub use message::{
    ERROR_MESSAGE_PROPERTY, ErrorRecord, InboundMessage, MessageMetadata, OutboundMessage,
    TIMESTAMP_PROPERTY,
};

/// A document whose every element has been moved into a single namespace.
///
/// Only [`crate::relay::transform::transform`] constructs one, so holding a
/// value of this type is proof that no pre-transform namespace is visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedDocument {
    document: Document,
    namespace: String,
}

impl TransformedDocument {
    pub(crate) const fn new(document: Document, namespace: String) -> Self {
        Self {
            document,
            namespace,
        }
    }

    /// Returns the rewritten tree.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }

    /// Returns the namespace every element now belongs to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Releases the rewritten tree.
    #[must_use]
    pub fn into_document(self) -> Document {
        self.document
    }

    /// Writes the document as compact XML.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Write`] when the writer fails.
    pub fn to_xml_string(&self) -> Result<String, DocumentError> {
        self.document.to_xml_string()
    }
}

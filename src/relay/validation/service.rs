//! Schema validator service.
//!
//! Provides the default implementation of the [`DocumentValidator`] port.

use super::rules::Validation;
use crate::relay::domain::{Document, Severity, ValidationError};
use crate::relay::ports::DocumentValidator;
use crate::relay::schema::Schema;
use std::sync::Arc;
use tracing::warn;

/// Parses `xml` and checks it against `schema` in one pass.
///
/// Warnings are logged and do not fail validation. Every error found in the
/// pass is returned together.
///
/// # Errors
///
/// Returns [`ValidationError::Malformed`] when `xml` is not well-formed and
/// [`ValidationError::SchemaViolation`] when it breaks the schema.
///
/// # Examples
///
/// ```
/// use xmlrelay::relay::schema::Schema;
/// use xmlrelay::relay::validation::validate;
///
/// let schema = Schema::parse(
///     r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
///                   targetNamespace="urn:example" elementFormDefault="qualified">
///          <xs:element name="id" type="xs:int"/>
///        </xs:schema>"#,
/// )
/// .expect("schema should load");
///
/// assert!(validate(r#"<id xmlns="urn:example">7</id>"#, &schema).is_ok());
/// assert!(validate(r#"<id xmlns="urn:example">seven</id>"#, &schema).is_err());
/// ```
pub fn validate(xml: &str, schema: &Schema) -> Result<Document, ValidationError> {
    let document = Document::parse(xml)?;
    let (errors, warnings): (Vec<_>, Vec<_>) = Validation::new(schema, &document)
        .run()
        .into_iter()
        .partition(|diagnostic| diagnostic.severity() == Severity::Error);

    for diagnostic in &warnings {
        warn!(
            path = diagnostic.path(),
            message = diagnostic.message(),
            "schema validation warning"
        );
    }
    if errors.is_empty() {
        Ok(document)
    } else {
        Err(ValidationError::SchemaViolation(errors))
    }
}

/// [`DocumentValidator`] backed by a shared, load-once [`Schema`].
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    schema: Arc<Schema>,
}

impl SchemaValidator {
    /// Creates a validator for `schema`.
    #[must_use]
    pub const fn new(schema: Arc<Schema>) -> Self {
        Self { schema }
    }

    /// Returns the schema documents are checked against.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl DocumentValidator for SchemaValidator {
    fn validate(&self, xml: &str) -> Result<Document, ValidationError> {
        validate(xml, &self.schema)
    }
}

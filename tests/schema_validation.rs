//! Behavioural integration tests for schema loading and validation.
//!
//! These tests use only the public API: a schema is loaded once and
//! payloads are checked against it the way each invocation does.

use rstest::{fixture, rstest};
use xmlrelay::relay::{
    domain::{Severity, ValidationError},
    schema::{Schema, SchemaError},
    validation::validate,
};

const RECORD_XSD: &str = include_str!("../schemas/record.xsd");

#[fixture]
fn schema() -> Schema {
    Schema::parse(RECORD_XSD).expect("record schema should load")
}

fn record(body: &str) -> String {
    format!(r#"<record xmlns="http://example.com/record">{body}</record>"#)
}

// ============================================================================
// Scenario: Conforming records are accepted
// ============================================================================

/// A record using every optional part of the schema validates and the
/// returned document is the parsed payload.
#[rstest]
fn conforming_record_is_accepted(schema: Schema) {
    let xml = record(
        "<id>42</id><name>Widget</name><status> archived </status>\
         <createdAt>2024-03-01T12:00:00Z</createdAt>\
         <tags><tag scheme=\"internal\">blue-1</tag></tags>\
         <payload><anything xmlns=\"urn:x\"><at>all</at></anything></payload>",
    );

    let document = validate(&xml, &schema).expect("record should be valid");

    assert_eq!(document.root().name().local_name(), "record");
    assert_eq!(document.element_count(), 10);
}

// ============================================================================
// Scenario: Violations are reported together
// ============================================================================

/// Every violation in a payload is reported, each located by path.
#[rstest]
fn all_violations_are_reported(schema: Schema) {
    let xml = record("<id>1.5</id><status>pending</status><tags><tag>Bad Tag</tag></tags>");

    let result = validate(&xml, &schema);

    let Err(ValidationError::SchemaViolation(diagnostics)) = result else {
        panic!("expected a schema violation, got {result:?}");
    };
    let paths: Vec<&str> = diagnostics.iter().map(|diagnostic| diagnostic.path()).collect();
    assert_eq!(paths, vec!["/record/id", "/record/status", "/record/tags/tag"]);
    assert!(diagnostics
        .iter()
        .all(|diagnostic| diagnostic.severity() == Severity::Error));
}

/// A payload in another namespace is not a record.
#[rstest]
fn wrong_namespace_is_rejected(schema: Schema) {
    let result = validate(r#"<record xmlns="urn:elsewhere"><id>1</id></record>"#, &schema);
    assert!(matches!(result, Err(ValidationError::SchemaViolation(_))));
}

// ============================================================================
// Scenario: Malformed payloads never reach schema checks
// ============================================================================

#[rstest]
#[case("")]
#[case("<record xmlns=\"http://example.com/record\"><id>1</id>")]
#[case("<record/><record/>")]
fn malformed_payloads_are_rejected(schema: Schema, #[case] xml: &str) {
    let result = validate(xml, &schema);
    assert!(matches!(result, Err(ref err) if err.is_malformed()));
}

// ============================================================================
// Scenario: Unsupported schemas fail at load time
// ============================================================================

/// Schemas using constructs the validator does not implement are refused
/// when loaded rather than silently under-validated.
#[rstest]
fn unsupported_schema_is_refused_at_load() {
    let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t">
        <xs:redefine schemaLocation="other.xsd"/>
    </xs:schema>"#;

    let result = Schema::parse(xsd);

    assert!(matches!(result, Err(SchemaError::Unsupported { .. })));
}

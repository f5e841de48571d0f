//! Unit tests for instance validation.

use super::rules::Validation;
use super::validate;
use crate::relay::domain::{Document, Severity, ValidationError};
use crate::relay::schema::Schema;
use eyre::{Result, bail, ensure};
use rstest::{fixture, rstest};

const RECORD_XSD: &str = include_str!("../../../schemas/record.xsd");
const RECORD_NS: &str = "http://example.com/record";
const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";

const FIXTURE_XSD: &str = r###"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
        xmlns:t="urn:test" targetNamespace="urn:test" elementFormDefault="qualified">
      <xs:element name="node">
        <xs:complexType>
          <xs:sequence><xs:element ref="t:node" minOccurs="0"/></xs:sequence>
          <xs:attribute name="level" type="xs:nonNegativeInteger"/>
        </xs:complexType>
      </xs:element>
      <xs:element name="point">
        <xs:complexType>
          <xs:all>
            <xs:element name="x" type="xs:decimal"/>
            <xs:element name="y" type="xs:decimal"/>
            <xs:element name="label" type="xs:string" minOccurs="0"/>
          </xs:all>
        </xs:complexType>
      </xs:element>
      <xs:element name="settings">
        <xs:complexType>
          <xs:sequence>
            <xs:element name="timeout" type="xs:int" nillable="true"/>
            <xs:element name="mode" type="xs:string" fixed="strict"/>
            <xs:element name="retries" type="xs:int" default="3"/>
          </xs:sequence>
          <xs:attribute name="kind" type="xs:string" use="required"/>
          <xs:attribute name="legacy" type="xs:string" use="prohibited"/>
          <xs:anyAttribute namespace="##other" processContents="skip"/>
        </xs:complexType>
      </xs:element>
      <xs:element name="envelope">
        <xs:complexType>
          <xs:sequence>
            <xs:any namespace="##targetNamespace" processContents="strict" maxOccurs="unbounded"/>
          </xs:sequence>
        </xs:complexType>
      </xs:element>
      <xs:element name="bag">
        <xs:complexType>
          <xs:sequence>
            <xs:any namespace="##any" processContents="lax" minOccurs="0" maxOccurs="unbounded"/>
          </xs:sequence>
        </xs:complexType>
      </xs:element>
      <xs:element name="window">
        <xs:simpleType>
          <xs:restriction base="xs:dateTime">
            <xs:minInclusive value="2024-01-01T00:00:00Z"/>
            <xs:maxExclusive value="2025-01-01T00:00:00Z"/>
          </xs:restriction>
        </xs:simpleType>
      </xs:element>
      <xs:element name="note" type="xs:string"/>
      <xs:element name="count" type="xs:int"/>
    </xs:schema>"###;

#[fixture]
fn record_schema() -> Schema {
    Schema::parse(RECORD_XSD).expect("record schema should load")
}

#[fixture]
fn fixture_schema() -> Schema {
    Schema::parse(FIXTURE_XSD).expect("fixture schema should load")
}

/// Returns `(path, message)` for every error, or an empty list when valid.
fn errors(xml: &str, schema: &Schema) -> Vec<(String, String)> {
    match validate(xml, schema) {
        Ok(_) => Vec::new(),
        Err(err) => err
            .diagnostics()
            .iter()
            .map(|diagnostic| (diagnostic.path().to_owned(), diagnostic.message().to_owned()))
            .collect(),
    }
}

fn record(body: &str) -> String {
    format!(r#"<record xmlns="{RECORD_NS}">{body}</record>"#)
}

#[rstest]
fn minimal_record_is_valid(record_schema: Schema) -> Result<()> {
    let document = validate(&record("<id>1</id>"), &record_schema)?;
    ensure!(document.element_count() == 2);
    Ok(())
}

#[rstest]
fn complete_record_is_valid(record_schema: Schema) -> Result<()> {
    let xml = format!(
        r#"<record xmlns="{RECORD_NS}" version="2">
             <id> 42 </id>
             <name>Example</name>
             <status>active</status>
             <createdAt>2024-05-01T12:30:00Z</createdAt>
             <tags><tag scheme="topic">alpha</tag><tag>beta-2</tag></tags>
             <payload><anything xmlns="urn:other" any="thing"><deep/></anything></payload>
           </record>"#
    );
    validate(&xml, &record_schema)?;
    Ok(())
}

#[rstest]
#[case::not_an_int("<id>abc</id>", "/record/id", "xs:int")]
#[case::int_overflow("<id>2147483648</id>", "/record/id", "out of range")]
#[case::status_outside_enumeration(
    "<id>1</id><status>unknown</status>",
    "/record/status",
    "allowed values"
)]
#[case::bad_date("<id>1</id><createdAt>yesterday</createdAt>", "/record/createdAt", "xs:dateTime")]
#[case::tag_pattern(
    "<id>1</id><tags><tag>Not Valid</tag></tags>",
    "/record/tags/tag",
    "pattern"
)]
#[case::tag_scheme(
    r#"<id>1</id><tags><tag scheme="1st">alpha</tag></tags>"#,
    "/record/tags/tag/@scheme",
    "xs:NCName"
)]
#[case::empty_tags("<id>1</id><tags/>", "/record/tags", "incomplete")]
#[case::missing_id("", "/record", "expected id")]
#[case::out_of_order("<name>a</name><id>1</id>", "/record/name", "unexpected element")]
#[case::text_in_element_content("<id>1</id>stray", "/record", "text content")]
fn record_violations_are_located(
    record_schema: Schema,
    #[case] body: &str,
    #[case] path: &str,
    #[case] mention: &str,
) -> Result<()> {
    let found = errors(&record(body), &record_schema);
    let [(found_path, message)] = found.as_slice() else {
        bail!("expected one error, found {found:?}");
    };
    ensure!(found_path == path, "path {found_path} should be {path}");
    ensure!(message.contains(mention), "'{message}' should mention {mention}");
    Ok(())
}

#[rstest]
fn unknown_attribute_is_rejected(record_schema: Schema) -> Result<()> {
    let xml = format!(r#"<record xmlns="{RECORD_NS}" colour="red"><id>1</id></record>"#);
    let found = errors(&xml, &record_schema);
    ensure!(found.len() == 1);
    ensure!(found.iter().all(|(path, _)| path == "/record/@colour"));
    Ok(())
}

#[rstest]
fn every_violation_is_reported(record_schema: Schema) -> Result<()> {
    let found = errors(
        &record("<id>x</id><status>unknown</status><tags><tag>UPPER</tag></tags>"),
        &record_schema,
    );
    let paths: Vec<&str> = found.iter().map(|(path, _)| path.as_str()).collect();
    ensure!(
        paths == vec!["/record/id", "/record/status", "/record/tags/tag"],
        "unexpected paths {paths:?}"
    );
    Ok(())
}

#[rstest]
fn violation_message_joins_diagnostics(record_schema: Schema) -> Result<()> {
    let Err(err) = validate(&record("<id>x</id><status>gone</status>"), &record_schema) else {
        bail!("document should be invalid");
    };
    let message = err.to_string();
    ensure!(message.starts_with("XML validation error: /record/id: "));
    ensure!(message.contains("; /record/status: "));
    Ok(())
}

#[rstest]
fn undeclared_document_element_is_rejected(record_schema: Schema) -> Result<()> {
    let found = errors(r#"<record xmlns="urn:wrong"><id>1</id></record>"#, &record_schema);
    let [(path, message)] = found.as_slice() else {
        bail!("expected one error, found {found:?}");
    };
    ensure!(path == "/record");
    ensure!(message.contains("{urn:wrong}record"));
    ensure!(message.contains(&format!("{{{RECORD_NS}}}record")));
    Ok(())
}

#[rstest]
#[case("<record><id>1</record>")]
#[case("")]
#[case("just text")]
fn malformed_payloads_are_not_schema_violations(record_schema: Schema, #[case] xml: &str) {
    let result = validate(xml, &record_schema);
    assert!(matches!(result, Err(ValidationError::Malformed(_))));
}

#[rstest]
fn schema_location_hint_is_only_a_warning(record_schema: Schema) -> Result<()> {
    let xml = format!(
        r#"<record xmlns="{RECORD_NS}" xmlns:xsi="{XSI}"
                   xsi:schemaLocation="{RECORD_NS} record.xsd"><id>1</id></record>"#
    );
    validate(&xml, &record_schema)?;

    let document = Document::parse(&xml)?;
    let diagnostics = Validation::new(&record_schema, &document).run();
    let [warning] = diagnostics.as_slice() else {
        bail!("expected one diagnostic, found {diagnostics:?}");
    };
    ensure!(warning.severity() == Severity::Warning);
    ensure!(warning.path() == "/record");
    Ok(())
}

#[rstest]
fn xsi_type_is_refused(record_schema: Schema) {
    let xml = format!(
        r#"<record xmlns="{RECORD_NS}" xmlns:xsi="{XSI}" xmlns:xs="http://www.w3.org/2001/XMLSchema"><id xsi:type="xs:int">1</id></record>"#
    );
    let found = errors(&xml, &record_schema);
    assert_eq!(found.len(), 1);
    assert!(found.iter().all(|(path, message)| {
        path == "/record/id" && message.contains("xsi:type")
    }));
}

#[rstest]
fn nil_requires_a_nillable_declaration(record_schema: Schema) {
    let xml = format!(
        r#"<record xmlns="{RECORD_NS}" xmlns:xsi="{XSI}"><id xsi:nil="true"/></record>"#
    );
    let found = errors(&xml, &record_schema);
    assert!(found.iter().any(|(path, message)| {
        path == "/record/id" && message.contains("not nillable")
    }));
}

#[rstest]
fn skipped_payload_may_nest_deeply(record_schema: Schema) -> Result<()> {
    let depth = 1_000;
    let opening = "<level>".repeat(depth);
    let closing = "</level>".repeat(depth);
    let xml = record(&format!(
        r#"<id>1</id><payload><wrap xmlns="urn:any">{opening}{closing}</wrap></payload>"#
    ));
    validate(&xml, &record_schema)?;
    Ok(())
}

#[rstest]
#[case(50)]
#[case(500)]
#[case(10_000)]
fn recursive_declarations_validate_deep_documents(
    fixture_schema: Schema,
    #[case] depth: usize,
) -> Result<()> {
    let opening = r#"<node xmlns="urn:test" level="1">"#.repeat(depth);
    let closing = "</node>".repeat(depth);
    validate(&format!("{opening}{closing}"), &fixture_schema)?;
    Ok(())
}

#[rstest]
fn deep_violation_reports_full_path(fixture_schema: Schema) -> Result<()> {
    let xml = r#"<node xmlns="urn:test"><node><node level="-1"/></node></node>"#;
    let found = errors(xml, &fixture_schema);
    let [(path, _)] = found.as_slice() else {
        bail!("expected one error, found {found:?}");
    };
    ensure!(path == "/node/node/node/@level");
    Ok(())
}

#[rstest]
#[case("<x>1</x><y>2</y>", None)]
#[case("<label>p</label><y>2</y><x>1.5</x>", None)]
#[case("<x>1</x>", Some("missing required element y"))]
#[case("<x>1</x><x>2</x><y>3</y>", Some("at most once"))]
#[case("<x>1</x><y>2</y><z/>", Some("unexpected element"))]
fn all_groups_accept_any_order(
    fixture_schema: Schema,
    #[case] body: &str,
    #[case] problem: Option<&str>,
) -> Result<()> {
    let found = errors(&format!(r#"<point xmlns="urn:test">{body}</point>"#), &fixture_schema);
    match problem {
        None => ensure!(found.is_empty(), "unexpected errors {found:?}"),
        Some(mention) => ensure!(
            found.len() == 1 && found.iter().all(|(_, message)| message.contains(mention)),
            "expected one error mentioning {mention}, found {found:?}"
        ),
    }
    Ok(())
}

fn settings(attributes: &str, body: &str) -> String {
    format!(
        r#"<settings xmlns="urn:test" xmlns:xsi="{XSI}" xmlns:o="urn:other" {attributes}>{body}</settings>"#
    )
}

#[rstest]
#[case::defaults_and_nil(
    r#"kind="a" o:extra="ignored""#,
    r#"<timeout xsi:nil="true"/><mode/><retries/>"#,
    None
)]
#[case::fixed_value_kept(r#"kind="a""#, "<timeout>5</timeout><mode>strict</mode><retries>1</retries>", None)]
#[case::fixed_value_changed(
    r#"kind="a""#,
    "<timeout>5</timeout><mode>lenient</mode><retries>1</retries>",
    Some(("/settings/mode", "fixed value"))
)]
#[case::nil_with_content(
    r#"kind="a""#,
    r#"<timeout xsi:nil="true">5</timeout><mode/><retries/>"#,
    Some(("/settings/timeout", "must be empty"))
)]
#[case::missing_required_attribute(
    "",
    "<timeout>5</timeout><mode/><retries/>",
    Some(("/settings", "missing required attribute kind"))
)]
#[case::prohibited_attribute(
    r#"kind="a" legacy="yes""#,
    "<timeout>5</timeout><mode/><retries/>",
    Some(("/settings/@legacy", "prohibited"))
)]
#[case::unqualified_extra_attribute(
    r#"kind="a" extra="no""#,
    "<timeout>5</timeout><mode/><retries/>",
    Some(("/settings/@extra", "not allowed"))
)]
fn value_constraints_and_attribute_uses(
    fixture_schema: Schema,
    #[case] attributes: &str,
    #[case] body: &str,
    #[case] problem: Option<(&str, &str)>,
) -> Result<()> {
    let found = errors(&settings(attributes, body), &fixture_schema);
    match problem {
        None => ensure!(found.is_empty(), "unexpected errors {found:?}"),
        Some((path, mention)) => {
            let [(found_path, message)] = found.as_slice() else {
                bail!("expected one error, found {found:?}");
            };
            ensure!(found_path == path, "path {found_path} should be {path}");
            ensure!(message.contains(mention), "'{message}' should mention {mention}");
        }
    }
    Ok(())
}

#[rstest]
fn strict_wildcards_require_global_declarations(fixture_schema: Schema) -> Result<()> {
    let valid = r#"<envelope xmlns="urn:test"><note>hi</note><envelope><note/></envelope></envelope>"#;
    ensure!(errors(valid, &fixture_schema).is_empty());

    let found = errors(
        r#"<envelope xmlns="urn:test"><note>hi</note><mystery/></envelope>"#,
        &fixture_schema,
    );
    let [(path, message)] = found.as_slice() else {
        bail!("expected one error, found {found:?}");
    };
    ensure!(path == "/envelope/mystery");
    ensure!(message.contains("strict wildcard"));
    Ok(())
}

#[rstest]
fn lax_wildcards_validate_what_they_recognise(fixture_schema: Schema) -> Result<()> {
    let valid = r#"<bag xmlns="urn:test"><x:thing xmlns:x="urn:x"><count>3</count></x:thing></bag>"#;
    ensure!(errors(valid, &fixture_schema).is_empty());

    let found = errors(
        r#"<bag xmlns="urn:test"><x:thing xmlns:x="urn:x"><count>three</count></x:thing></bag>"#,
        &fixture_schema,
    );
    let [(path, _)] = found.as_slice() else {
        bail!("expected one error, found {found:?}");
    };
    ensure!(path == "/bag/thing/count");
    Ok(())
}

#[rstest]
#[case("2024-06-30T12:00:00Z", true)]
#[case("2024-01-01T01:00:00+01:00", true)]
#[case("2023-12-31T23:59:59Z", false)]
#[case("2025-01-01T00:00:00Z", false)]
#[case("2024-12-31T23:00:00-02:00", false)]
fn date_time_ranges_compare_instants(
    fixture_schema: Schema,
    #[case] value: &str,
    #[case] valid: bool,
) -> Result<()> {
    let xml = format!(r#"<window xmlns="urn:test">{value}</window>"#);
    let found = errors(&xml, &fixture_schema);
    ensure!(found.is_empty() == valid, "{value}: {found:?}");
    Ok(())
}

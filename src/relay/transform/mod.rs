//! Namespace rewrite.

use crate::relay::domain::{Document, TransformedDocument};

/// Moves every element of `document` into `target_namespace`.
///
/// Total and deterministic: local names, attributes, text, comments and the
/// order of children are untouched. Elements are visited by a pre-order walk
/// over an explicit stack, so arbitrarily deep documents are rewritten in
/// full without growing the call stack. Applying the rewrite twice with the
/// same namespace gives the same tree as applying it once.
#[must_use]
pub fn transform(document: Document, target_namespace: &str) -> TransformedDocument {
    let mut rewritten = document;
    rewritten.rename_all(target_namespace);
    TransformedDocument::new(rewritten, target_namespace.to_owned())
}

#[cfg(test)]
mod tests {
    use super::transform;
    use crate::relay::domain::{Document, Node, QName};
    use proptest::prelude::*;
    use rstest::rstest;

    const TARGET: &str = "http://example.com/new-namespace";

    fn parse(xml: &str) -> Document {
        Document::parse(xml).expect("fixture should be well-formed")
    }

    #[rstest]
    fn rewrites_root_and_descendants() {
        let input = parse(r#"<a xmlns="urn:old"><b><c xmlns="urn:other"/></b><d xmlns=""/></a>"#);

        let output = transform(input, TARGET);

        assert!(output
            .document()
            .walk()
            .all(|(_, element)| element.name().namespace() == Some(TARGET)));
        assert_eq!(output.namespace(), TARGET);
    }

    #[rstest]
    fn keeps_attributes_text_and_comments() {
        let input = parse(
            r#"<a xmlns="urn:old" xmlns:x="urn:x" x:k="1" plain="2">t<!--c--><b>u</b></a>"#,
        );
        let expected_root_attributes = input.root().attributes().to_vec();

        let output = transform(input, TARGET);
        let root = output.document().root();

        assert_eq!(root.attributes(), expected_root_attributes.as_slice());
        assert_eq!(root.name(), &QName::namespaced(TARGET, "a"));
        assert!(matches!(root.children().first(), Some(Node::Text(text)) if text == "t"));
        assert!(matches!(root.children().get(1), Some(Node::Comment(text)) if text == "c"));
    }

    #[rstest]
    #[case(50)]
    #[case(500)]
    #[case(1_000)]
    #[case(20_000)]
    fn rewrites_every_level_of_deep_documents(#[case] depth: usize) {
        let xml = format!(
            r#"{}{}"#,
            "<n xmlns=\"urn:old\">".repeat(depth),
            "</n>".repeat(depth)
        );

        let output = transform(parse(&xml), TARGET);

        let levels: Vec<_> = output.document().walk().collect();
        assert_eq!(levels.len(), depth);
        assert!(levels
            .iter()
            .all(|(_, element)| element.name() == &QName::namespaced(TARGET, "n")));
    }

    #[rstest]
    fn writes_the_documented_success_example() {
        let input = parse(r#"<record xmlns="http://example.com/record"><id>1</id></record>"#);

        let written = transform(input, TARGET)
            .to_xml_string()
            .expect("document should write");

        assert_eq!(
            written,
            r#"<record xmlns="http://example.com/new-namespace"><id>1</id></record>"#
        );
    }

    fn arbitrary_document() -> impl Strategy<Value = String> {
        let leaf = prop_oneof![
            "[a-z]{1,6}".prop_map(|text| text),
            "[a-z]{1,4}".prop_map(|name| format!("<{name}/>")),
        ];
        leaf.prop_recursive(6, 48, 4, |inner| {
            (
                "[a-z]{1,4}",
                prop::option::of("urn:[a-z]{1,4}"),
                "[a-z0-9]{0,4}",
                prop::collection::vec(inner, 0..4),
            )
                .prop_map(|(name, namespace, value, children)| {
                    let declaration = namespace
                        .map(|uri| format!(r#" xmlns="{uri}""#))
                        .unwrap_or_default();
                    format!(
                        r#"<{name}{declaration} v="{value}">{}</{name}>"#,
                        children.concat()
                    )
                })
        })
        .prop_map(|body| format!("<root>{body}</root>"))
    }

    proptest! {
        #[test]
        fn transform_is_idempotent(xml in arbitrary_document()) {
            let once = transform(parse(&xml), TARGET);
            let twice = transform(once.clone().into_document(), TARGET);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn transform_changes_only_namespaces(xml in arbitrary_document()) {
            let input = parse(&xml);
            let output = transform(input.clone(), TARGET);

            prop_assert_eq!(input.element_count(), output.document().element_count());
            for ((_, before), (_, after)) in input.walk().zip(output.document().walk()) {
                prop_assert_eq!(before.name().local_name(), after.name().local_name());
                prop_assert_eq!(before.attributes(), after.attributes());
                prop_assert_eq!(before.children(), after.children());
                prop_assert_eq!(after.name().namespace(), Some(TARGET));
            }
        }
    }
}

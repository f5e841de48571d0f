//! Simple-type value checks shared by element text and attribute values.

use crate::relay::schema::{ChainBase, Primitive, Schema, TypeId, compare};
use std::cmp::Ordering;

/// Checks `raw` against the simple type `type_id` and returns the value
/// after whitespace normalisation.
///
/// # Errors
///
/// Returns a human-readable reason when the value is outside the type.
pub(crate) fn check(schema: &Schema, type_id: TypeId, raw: &str) -> Result<String, String> {
    let chain = schema.simple_chain(type_id).map_err(|err| err.to_string())?;
    let white_space = chain.white_space();
    let value = white_space.normalize(raw);

    match chain.base {
        ChainBase::Atomic(builtin) => {
            builtin.check(&value)?;
            for facets in &chain.facets {
                facets.check_atomic(&value, builtin.primitive(), white_space)?;
            }
        }
        ChainBase::List(item) => {
            let mut items = 0_usize;
            for token in value.split_whitespace() {
                check(schema, item, token)
                    .map_err(|reason| format!("list item '{token}': {reason}"))?;
                items += 1;
            }
            for facets in &chain.facets {
                facets.check_list(&value, items)?;
            }
        }
    }
    Ok(value)
}

/// Returns whether two lexical values denote the same value of `type_id`.
///
/// Used for `fixed` constraints, so `"01"` equals `"1"` for an integer type.
pub(crate) fn same_value(schema: &Schema, type_id: TypeId, left: &str, right: &str) -> bool {
    let Ok(chain) = schema.simple_chain(type_id) else {
        return left == right;
    };
    let white_space = chain.white_space();
    let left = white_space.normalize(left);
    let right = white_space.normalize(right);
    let primitive = match chain.base {
        ChainBase::Atomic(builtin) => builtin.primitive(),
        ChainBase::List(_) => Primitive::String,
    };
    compare(primitive, &left, &right) == Some(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::domain::QName;
    use rstest::{fixture, rstest};

    const SCHEMA: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
            xmlns:t="urn:test" targetNamespace="urn:test">
          <xs:element name="score" type="t:Score"/>
          <xs:element name="codes" type="t:Codes"/>
          <xs:element name="label" type="xs:token"/>
          <xs:simpleType name="Score">
            <xs:restriction base="xs:integer">
              <xs:minInclusive value="0"/>
              <xs:maxInclusive value="100"/>
            </xs:restriction>
          </xs:simpleType>
          <xs:simpleType name="Codes">
            <xs:restriction>
              <xs:simpleType><xs:list itemType="t:Code"/></xs:simpleType>
              <xs:maxLength value="3"/>
            </xs:restriction>
          </xs:simpleType>
          <xs:simpleType name="Code">
            <xs:restriction base="xs:string"><xs:pattern value="[A-Z]{2}"/></xs:restriction>
          </xs:simpleType>
        </xs:schema>"#;

    #[fixture]
    fn schema() -> Schema {
        Schema::parse(SCHEMA).expect("test schema should load")
    }

    fn type_of(schema: &Schema, local: &str) -> TypeId {
        schema
            .global_element(&QName::namespaced("urn:test", local))
            .map(|(_, decl)| decl.type_id)
            .expect("element should be declared")
    }

    #[rstest]
    #[case(" 42 ", true)]
    #[case("100", true)]
    #[case("101", false)]
    #[case("-1", false)]
    #[case("4.2", false)]
    fn restricted_integer_values(schema: Schema, #[case] raw: &str, #[case] valid: bool) {
        let result = check(&schema, type_of(&schema, "score"), raw);
        assert_eq!(result.is_ok(), valid, "{raw}: {result:?}");
    }

    #[rstest]
    #[case("AB CD", true)]
    #[case("  AB\n\tCD  EF ", true)]
    #[case("AB CD EF GH", false)]
    #[case("AB cd", false)]
    fn list_values_check_items_and_length(
        schema: Schema,
        #[case] raw: &str,
        #[case] valid: bool,
    ) {
        let result = check(&schema, type_of(&schema, "codes"), raw);
        assert_eq!(result.is_ok(), valid, "{raw}: {result:?}");
    }

    #[rstest]
    fn returns_collapsed_value(schema: Schema) {
        let value = check(&schema, type_of(&schema, "label"), "  two   words ")
            .expect("token should be valid");
        assert_eq!(value, "two words");
    }

    #[rstest]
    #[case("007", "7", true)]
    #[case("7", "8", false)]
    fn fixed_values_compare_in_value_space(
        schema: Schema,
        #[case] left: &str,
        #[case] right: &str,
        #[case] equal: bool,
    ) {
        assert_eq!(same_value(&schema, type_of(&schema, "score"), left, right), equal);
    }
}

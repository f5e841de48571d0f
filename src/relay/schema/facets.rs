//! Constraining facets of a simple-type restriction.

use super::builtins::{
    Primitive, WhiteSpace, decode_base64, decode_hex_len, parse_decimal, parse_float,
    parse_temporal,
};
use super::error::SchemaError;
use regex::Regex;
use std::cmp::Ordering;

/// Facets declared by one `xs:restriction` step.
///
/// Patterns declared in the same step are alternatives; the steps of a
/// derivation chain all apply.
#[derive(Debug, Clone, Default)]
pub(crate) struct Facets {
    pub(crate) enumeration: Vec<String>,
    pub(crate) pattern: Option<Pattern>,
    pub(crate) length: Option<usize>,
    pub(crate) min_length: Option<usize>,
    pub(crate) max_length: Option<usize>,
    pub(crate) min_inclusive: Option<String>,
    pub(crate) max_inclusive: Option<String>,
    pub(crate) min_exclusive: Option<String>,
    pub(crate) max_exclusive: Option<String>,
    pub(crate) total_digits: Option<u32>,
    pub(crate) fraction_digits: Option<u32>,
    pub(crate) white_space: Option<WhiteSpace>,
}

#[derive(Debug, Clone)]
pub(crate) struct Pattern {
    sources: Vec<String>,
    regex: Regex,
}

impl Pattern {
    pub(crate) fn compile(sources: Vec<String>) -> Result<Self, SchemaError> {
        let alternatives = sources
            .iter()
            .map(|source| translate_pattern(source).map(|translated| format!("(?:{translated})")))
            .collect::<Result<Vec<_>, _>>()?;
        let anchored = format!("^(?:{})$", alternatives.join("|"));
        let regex = Regex::new(&anchored)
            .map_err(|err| SchemaError::invalid_facet("pattern", err.to_string()))?;
        Ok(Self { sources, regex })
    }

    fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    fn describe(&self) -> String {
        self.sources.join("' or '")
    }
}

/// Rewrites an XML Schema regular expression into `regex` syntax.
///
/// XML Schema patterns are implicitly anchored and treat `^` and `$` as
/// literals. Name-character escapes (`\i`, `\c`) and character-class
/// subtraction have no `regex` equivalent and are rejected.
fn translate_pattern(pattern: &str) -> Result<String, SchemaError> {
    let unsupported = |what: &str| {
        SchemaError::invalid_facet("pattern", format!("'{pattern}' uses unsupported {what}"))
    };
    let mut translated = String::with_capacity(pattern.len());
    let mut in_class = false;
    let mut previous = None;
    let mut chars = pattern.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                let escaped = chars.next().ok_or_else(|| unsupported("trailing escape"))?;
                if matches!(escaped, 'i' | 'I' | 'c' | 'C') {
                    return Err(unsupported("name-character escapes"));
                }
                translated.push('\\');
                translated.push(escaped);
                previous = Some(escaped);
                continue;
            }
            '[' if in_class => {
                if previous == Some('-') {
                    return Err(unsupported("character-class subtraction"));
                }
                translated.push_str("\\[");
            }
            '[' => {
                in_class = true;
                translated.push('[');
            }
            ']' if in_class => {
                in_class = false;
                translated.push(']');
            }
            '&' | '~' if in_class => {
                translated.push('\\');
                translated.push(ch);
            }
            '^' | '$' if !in_class => {
                translated.push('\\');
                translated.push(ch);
            }
            _ => translated.push(ch),
        }
        previous = Some(ch);
    }
    Ok(translated)
}

impl Facets {
    pub(crate) const fn has_length(&self) -> bool {
        self.length.is_some() || self.min_length.is_some() || self.max_length.is_some()
    }

    fn range_bounds(&self) -> [(&'static str, Option<&String>); 4] {
        [
            ("minInclusive", self.min_inclusive.as_ref()),
            ("maxInclusive", self.max_inclusive.as_ref()),
            ("minExclusive", self.min_exclusive.as_ref()),
            ("maxExclusive", self.max_exclusive.as_ref()),
        ]
    }

    /// Rejects facets that cannot apply to `primitive`, and range bounds that
    /// are not values of it.
    pub(crate) fn check_applicable(&self, primitive: Primitive, is_list: bool) -> Result<(), SchemaError> {
        if self.has_length() && !is_list && matches!(
            primitive,
            Primitive::Boolean | Primitive::Decimal | Primitive::Float | Primitive::Temporal
        ) {
            return Err(SchemaError::invalid_facet(
                "length",
                "length facets do not apply to numeric, boolean or temporal types",
            ));
        }
        if (self.total_digits.is_some() || self.fraction_digits.is_some())
            && (is_list || primitive != Primitive::Decimal)
        {
            return Err(SchemaError::invalid_facet(
                "totalDigits",
                "digit facets apply only to decimal types",
            ));
        }
        let ordered = matches!(
            primitive,
            Primitive::Decimal | Primitive::Float | Primitive::Temporal
        );
        for (facet, bound) in self.range_bounds() {
            let Some(bound) = bound else {
                continue;
            };
            if is_list || !ordered {
                return Err(SchemaError::invalid_facet(
                    facet,
                    "range facets apply only to numeric, date and time types",
                ));
            }
            if compare(primitive, bound, bound).is_none() {
                return Err(SchemaError::invalid_facet(
                    facet,
                    format!("'{bound}' is not a value of the base type"),
                ));
            }
        }
        Ok(())
    }

    /// Checks an atomic value already normalised for whitespace.
    pub(crate) fn check_atomic(
        &self,
        value: &str,
        primitive: Primitive,
        white_space: WhiteSpace,
    ) -> Result<(), String> {
        self.check_enumeration(value, primitive, white_space)?;
        self.check_pattern(value)?;
        if self.has_length() {
            let length = match primitive {
                Primitive::HexBinary => decode_hex_len(value).unwrap_or_default(),
                Primitive::Base64Binary => decode_base64(value).map(|bytes| bytes.len()).unwrap_or_default(),
                _ => value.chars().count(),
            };
            self.check_length(value, length)?;
        }
        self.check_range(value, primitive)?;
        self.check_digits(value)
    }

    /// Checks a list value: length facets count items.
    pub(crate) fn check_list(&self, value: &str, items: usize) -> Result<(), String> {
        self.check_enumeration(value, Primitive::String, WhiteSpace::Collapse)?;
        self.check_pattern(value)?;
        self.check_length(value, items)
    }

    fn check_enumeration(
        &self,
        value: &str,
        primitive: Primitive,
        white_space: WhiteSpace,
    ) -> Result<(), String> {
        if self.enumeration.is_empty() {
            return Ok(());
        }
        let found = self.enumeration.iter().any(|allowed| {
            let normalized = white_space.normalize(allowed);
            compare(primitive, value, &normalized) == Some(Ordering::Equal)
        });
        if found {
            Ok(())
        } else {
            Err(format!(
                "'{value}' is not one of the allowed values: {}",
                self.enumeration.join(", ")
            ))
        }
    }

    fn check_pattern(&self, value: &str) -> Result<(), String> {
        match &self.pattern {
            Some(pattern) if !pattern.is_match(value) => Err(format!(
                "'{value}' does not match pattern '{}'",
                pattern.describe()
            )),
            _ => Ok(()),
        }
    }

    fn check_length(&self, value: &str, length: usize) -> Result<(), String> {
        if let Some(expected) = self.length
            && length != expected
        {
            return Err(format!("'{value}' has length {length}, expected {expected}"));
        }
        if let Some(min) = self.min_length
            && length < min
        {
            return Err(format!("'{value}' is shorter than the minimum length {min}"));
        }
        if let Some(max) = self.max_length
            && length > max
        {
            return Err(format!("'{value}' is longer than the maximum length {max}"));
        }
        Ok(())
    }

    fn check_range(&self, value: &str, primitive: Primitive) -> Result<(), String> {
        for (facet, bound) in self.range_bounds() {
            let Some(bound) = bound else {
                continue;
            };
            let ordering = compare(primitive, value, bound);
            let satisfied = match facet {
                "minInclusive" => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                "maxInclusive" => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                "minExclusive" => ordering == Some(Ordering::Greater),
                _ => ordering == Some(Ordering::Less),
            };
            if !satisfied {
                return Err(format!("'{value}' violates {facet} {bound}"));
            }
        }
        Ok(())
    }

    fn check_digits(&self, value: &str) -> Result<(), String> {
        if self.total_digits.is_none() && self.fraction_digits.is_none() {
            return Ok(());
        }
        let Some(decimal) = parse_decimal(value) else {
            return Ok(());
        };
        let normalized = decimal.normalize();
        let fraction = normalized.scale();
        let total = u32::try_from(normalized.mantissa().unsigned_abs().to_string().len())
            .unwrap_or(u32::MAX)
            .max(fraction);
        if let Some(max) = self.total_digits
            && total > max
        {
            return Err(format!("'{value}' has more than {max} total digits"));
        }
        if let Some(max) = self.fraction_digits
            && fraction > max
        {
            return Err(format!("'{value}' has more than {max} fraction digits"));
        }
        Ok(())
    }
}

/// Compares two lexical values in the value space of `primitive`.
///
/// Returns `None` when either side is not a value of the space, or when the
/// values are unordered (NaN).
pub(crate) fn compare(primitive: Primitive, left: &str, right: &str) -> Option<Ordering> {
    match primitive {
        Primitive::Decimal => Some(parse_decimal(left)?.cmp(&parse_decimal(right)?)),
        Primitive::Float => parse_float(left)?.partial_cmp(&parse_float(right)?),
        Primitive::Temporal => Some(parse_temporal(left)?.cmp(&parse_temporal(right)?)),
        Primitive::Boolean => {
            let truth = |value: &str| matches!(value, "true" | "1");
            Some(truth(left).cmp(&truth(right)))
        }
        _ => Some(left.cmp(right)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn pattern(source: &str) -> Pattern {
        Pattern::compile(vec![source.to_owned()]).expect("pattern should compile")
    }

    #[rstest]
    #[case("[a-z0-9][a-z0-9-]*", "tag-1", true)]
    #[case("[a-z0-9][a-z0-9-]*", "-tag", false)]
    #[case("[a-z0-9][a-z0-9-]*", "xtag!", false)]
    #[case("\\d{3}", "123", true)]
    #[case("\\d{3}", "1234", false)]
    #[case("a^b$", "a^b$", true)]
    #[case("[&~]+", "&~", true)]
    fn patterns_are_anchored_and_literal(
        #[case] source: &str,
        #[case] value: &str,
        #[case] matches: bool,
    ) {
        assert_eq!(pattern(source).is_match(value), matches);
    }

    #[rstest]
    #[case("\\i\\c*")]
    #[case("[a-z-[aeiou]]")]
    fn rejects_untranslatable_patterns(#[case] source: &str) {
        assert!(Pattern::compile(vec![source.to_owned()]).is_err());
    }

    #[rstest]
    fn patterns_in_one_step_are_alternatives() {
        let either = Pattern::compile(vec!["a+".to_owned(), "b+".to_owned()])
            .expect("patterns should compile");
        assert!(either.is_match("aaa"));
        assert!(either.is_match("bb"));
        assert!(!either.is_match("ab"));
    }

    #[rstest]
    fn enumeration_compares_numeric_values() {
        let facets = Facets {
            enumeration: vec!["1.0".to_owned(), "2".to_owned()],
            ..Facets::default()
        };
        assert!(facets.check_atomic("1", Primitive::Decimal, WhiteSpace::Collapse).is_ok());
        assert!(facets.check_atomic("3", Primitive::Decimal, WhiteSpace::Collapse).is_err());
    }

    #[rstest]
    #[case("5", true)]
    #[case("10", true)]
    #[case("11", false)]
    #[case("0", false)]
    fn range_facets_bound_values(#[case] value: &str, #[case] valid: bool) {
        let facets = Facets {
            min_exclusive: Some("0".to_owned()),
            max_inclusive: Some("10".to_owned()),
            ..Facets::default()
        };
        assert_eq!(
            facets.check_atomic(value, Primitive::Decimal, WhiteSpace::Collapse).is_ok(),
            valid
        );
    }

    #[rstest]
    #[case("123.45", true)]
    #[case("1234.56", false)]
    #[case("12.345", false)]
    #[case("0012.300", true)]
    fn digit_facets_ignore_insignificant_zeros(#[case] value: &str, #[case] valid: bool) {
        let facets = Facets {
            total_digits: Some(5),
            fraction_digits: Some(2),
            ..Facets::default()
        };
        assert_eq!(
            facets.check_atomic(value, Primitive::Decimal, WhiteSpace::Collapse).is_ok(),
            valid
        );
    }

    #[rstest]
    fn length_facets_count_octets_for_binary_types() {
        let facets = Facets {
            length: Some(2),
            ..Facets::default()
        };
        assert!(facets.check_atomic("0aff", Primitive::HexBinary, WhiteSpace::Collapse).is_ok());
        assert!(facets.check_atomic("0a", Primitive::HexBinary, WhiteSpace::Collapse).is_err());
    }

    #[rstest]
    fn range_facets_are_rejected_on_strings() {
        let facets = Facets {
            min_inclusive: Some("a".to_owned()),
            ..Facets::default()
        };
        assert!(facets.check_applicable(Primitive::String, false).is_err());
        assert!(facets.check_applicable(Primitive::Decimal, false).is_err());
    }
}

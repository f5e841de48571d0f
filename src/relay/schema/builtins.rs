//! Built-in simple types of the XML Schema namespace.
//!
//! Each check receives a value whose whitespace has already been normalised
//! for the type and returns a human-readable reason on failure.

use base64::Engine;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use rust_decimal::Decimal;

/// Namespace of the XML Schema definition language.
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Whitespace handling applied before a value is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WhiteSpace {
    Preserve,
    Replace,
    Collapse,
}

impl WhiteSpace {
    pub(crate) fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "preserve" => Some(Self::Preserve),
            "replace" => Some(Self::Replace),
            "collapse" => Some(Self::Collapse),
            _ => None,
        }
    }

    pub(crate) fn normalize(self, value: &str) -> String {
        match self {
            Self::Preserve => value.to_owned(),
            Self::Replace => value.replace(['\t', '\n', '\r'], " "),
            Self::Collapse => value.split_ascii_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

/// Value space a built-in type belongs to; decides which facets apply and
/// how values compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Primitive {
    String,
    Boolean,
    Decimal,
    Float,
    Temporal,
    Base64Binary,
    HexBinary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Builtin {
    AnySimpleType,
    String,
    NormalizedString,
    Token,
    Language,
    Name,
    NcName,
    NmToken,
    Id,
    IdRef,
    Entity,
    QName,
    AnyUri,
    Boolean,
    Decimal,
    Integer,
    NonPositiveInteger,
    NegativeInteger,
    Long,
    Int,
    Short,
    Byte,
    NonNegativeInteger,
    UnsignedLong,
    UnsignedInt,
    UnsignedShort,
    UnsignedByte,
    PositiveInteger,
    Float,
    Double,
    Date,
    DateTime,
    Time,
    Base64Binary,
    HexBinary,
}

impl Builtin {
    pub(crate) fn from_local_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "anySimpleType" => Self::AnySimpleType,
            "string" => Self::String,
            "normalizedString" => Self::NormalizedString,
            "token" => Self::Token,
            "language" => Self::Language,
            "Name" => Self::Name,
            "NCName" => Self::NcName,
            "NMTOKEN" => Self::NmToken,
            "ID" => Self::Id,
            "IDREF" => Self::IdRef,
            "ENTITY" => Self::Entity,
            "QName" => Self::QName,
            "anyURI" => Self::AnyUri,
            "boolean" => Self::Boolean,
            "decimal" => Self::Decimal,
            "integer" => Self::Integer,
            "nonPositiveInteger" => Self::NonPositiveInteger,
            "negativeInteger" => Self::NegativeInteger,
            "long" => Self::Long,
            "int" => Self::Int,
            "short" => Self::Short,
            "byte" => Self::Byte,
            "nonNegativeInteger" => Self::NonNegativeInteger,
            "unsignedLong" => Self::UnsignedLong,
            "unsignedInt" => Self::UnsignedInt,
            "unsignedShort" => Self::UnsignedShort,
            "unsignedByte" => Self::UnsignedByte,
            "positiveInteger" => Self::PositiveInteger,
            "float" => Self::Float,
            "double" => Self::Double,
            "date" => Self::Date,
            "dateTime" => Self::DateTime,
            "time" => Self::Time,
            "base64Binary" => Self::Base64Binary,
            "hexBinary" => Self::HexBinary,
            _ => return None,
        };
        Some(builtin)
    }

    pub(crate) const fn local_name(self) -> &'static str {
        match self {
            Self::AnySimpleType => "anySimpleType",
            Self::String => "string",
            Self::NormalizedString => "normalizedString",
            Self::Token => "token",
            Self::Language => "language",
            Self::Name => "Name",
            Self::NcName => "NCName",
            Self::NmToken => "NMTOKEN",
            Self::Id => "ID",
            Self::IdRef => "IDREF",
            Self::Entity => "ENTITY",
            Self::QName => "QName",
            Self::AnyUri => "anyURI",
            Self::Boolean => "boolean",
            Self::Decimal => "decimal",
            Self::Integer => "integer",
            Self::NonPositiveInteger => "nonPositiveInteger",
            Self::NegativeInteger => "negativeInteger",
            Self::Long => "long",
            Self::Int => "int",
            Self::Short => "short",
            Self::Byte => "byte",
            Self::NonNegativeInteger => "nonNegativeInteger",
            Self::UnsignedLong => "unsignedLong",
            Self::UnsignedInt => "unsignedInt",
            Self::UnsignedShort => "unsignedShort",
            Self::UnsignedByte => "unsignedByte",
            Self::PositiveInteger => "positiveInteger",
            Self::Float => "float",
            Self::Double => "double",
            Self::Date => "date",
            Self::DateTime => "dateTime",
            Self::Time => "time",
            Self::Base64Binary => "base64Binary",
            Self::HexBinary => "hexBinary",
        }
    }

    pub(crate) const fn primitive(self) -> Primitive {
        match self {
            Self::Boolean => Primitive::Boolean,
            Self::Decimal
            | Self::Integer
            | Self::NonPositiveInteger
            | Self::NegativeInteger
            | Self::Long
            | Self::Int
            | Self::Short
            | Self::Byte
            | Self::NonNegativeInteger
            | Self::UnsignedLong
            | Self::UnsignedInt
            | Self::UnsignedShort
            | Self::UnsignedByte
            | Self::PositiveInteger => Primitive::Decimal,
            Self::Float | Self::Double => Primitive::Float,
            Self::Date | Self::DateTime | Self::Time => Primitive::Temporal,
            Self::Base64Binary => Primitive::Base64Binary,
            Self::HexBinary => Primitive::HexBinary,
            _ => Primitive::String,
        }
    }

    pub(crate) const fn white_space(self) -> WhiteSpace {
        match self {
            Self::AnySimpleType | Self::String => WhiteSpace::Preserve,
            Self::NormalizedString => WhiteSpace::Replace,
            _ => WhiteSpace::Collapse,
        }
    }

    /// Checks the lexical form (and, for bounded integers, the range) of
    /// `value`.
    pub(crate) fn check(self, value: &str) -> Result<(), String> {
        let valid = match self {
            Self::AnySimpleType
            | Self::String
            | Self::NormalizedString
            | Self::Token
            | Self::AnyUri => true,
            Self::Language => is_language(value),
            Self::Name => is_name(value, true),
            Self::NcName | Self::Id | Self::IdRef | Self::Entity => is_name(value, false),
            Self::NmToken => !value.is_empty() && value.chars().all(is_name_char),
            Self::QName => is_qname(value),
            Self::Boolean => matches!(value, "true" | "false" | "1" | "0"),
            Self::Decimal => parse_decimal(value).is_some(),
            Self::Float | Self::Double => parse_float(value).is_some(),
            Self::Date => is_date(value),
            Self::DateTime => is_date_time(value),
            Self::Time => is_time(value),
            Self::Base64Binary => decode_base64(value).is_some(),
            Self::HexBinary => decode_hex_len(value).is_some(),
            _ => return self.check_integer(value),
        };
        if valid {
            Ok(())
        } else {
            Err(format!(
                "'{value}' is not a valid xs:{}",
                self.local_name()
            ))
        }
    }

    fn check_integer(self, value: &str) -> Result<(), String> {
        let parsed = is_integer_lexical(value)
            .then(|| parse_decimal(value))
            .flatten()
            .ok_or_else(|| format!("'{value}' is not a valid xs:{}", self.local_name()))?;
        let (min, max) = self.integer_bounds();
        let below = min.is_some_and(|bound| parsed < bound);
        let above = max.is_some_and(|bound| parsed > bound);
        if below || above {
            return Err(format!(
                "'{value}' is out of range for xs:{}",
                self.local_name()
            ));
        }
        Ok(())
    }

    fn integer_bounds(self) -> (Option<Decimal>, Option<Decimal>) {
        match self {
            Self::NonPositiveInteger => (None, Some(Decimal::ZERO)),
            Self::NegativeInteger => (None, Some(Decimal::NEGATIVE_ONE)),
            Self::Long => (Some(Decimal::from(i64::MIN)), Some(Decimal::from(i64::MAX))),
            Self::Int => (Some(Decimal::from(i32::MIN)), Some(Decimal::from(i32::MAX))),
            Self::Short => (Some(Decimal::from(i16::MIN)), Some(Decimal::from(i16::MAX))),
            Self::Byte => (Some(Decimal::from(i8::MIN)), Some(Decimal::from(i8::MAX))),
            Self::NonNegativeInteger => (Some(Decimal::ZERO), None),
            Self::UnsignedLong => (Some(Decimal::ZERO), Some(Decimal::from(u64::MAX))),
            Self::UnsignedInt => (Some(Decimal::ZERO), Some(Decimal::from(u32::MAX))),
            Self::UnsignedShort => (Some(Decimal::ZERO), Some(Decimal::from(u16::MAX))),
            Self::UnsignedByte => (Some(Decimal::ZERO), Some(Decimal::from(u8::MAX))),
            Self::PositiveInteger => (Some(Decimal::ONE), None),
            _ => (None, None),
        }
    }
}

fn is_integer_lexical(value: &str) -> bool {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
}

/// Parses an `xs:decimal` lexical value.
pub(crate) fn parse_decimal(value: &str) -> Option<Decimal> {
    let (negative, unsigned) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let all_digits = |part: &str| part.bytes().all(|byte| byte.is_ascii_digit());
    if (integer.is_empty() && fraction.is_empty()) || !all_digits(integer) || !all_digits(fraction)
    {
        return None;
    }
    let integer_part = if integer.is_empty() { "0" } else { integer };
    let canonical = if fraction.is_empty() {
        integer_part.to_owned()
    } else {
        format!("{integer_part}.{fraction}")
    };
    let magnitude = canonical.parse::<Decimal>().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Parses an `xs:float` or `xs:double` lexical value.
pub(crate) fn parse_float(value: &str) -> Option<f64> {
    match value {
        "INF" => return Some(f64::INFINITY),
        "-INF" => return Some(f64::NEG_INFINITY),
        "NaN" => return Some(f64::NAN),
        _ => {}
    }
    let lexical = value
        .bytes()
        .all(|byte| byte.is_ascii_digit() || matches!(byte, b'+' | b'-' | b'.' | b'e' | b'E'));
    if !lexical || !value.bytes().any(|byte| byte.is_ascii_digit()) {
        return None;
    }
    value.parse::<f64>().ok()
}

/// Decodes base64 content, ignoring the spaces a collapsed value may carry.
pub(crate) fn decode_base64(value: &str) -> Option<Vec<u8>> {
    let compact: String = value.chars().filter(|ch| *ch != ' ').collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .ok()
}

/// Returns the number of octets encoded by a hexBinary value.
pub(crate) fn decode_hex_len(value: &str) -> Option<usize> {
    let pairs: Vec<&[u8]> = value.as_bytes().chunks(2).collect();
    let valid = pairs
        .iter()
        .all(|pair| pair.len() == 2 && pair.iter().all(u8::is_ascii_hexdigit));
    valid.then_some(pairs.len())
}

fn is_name_start_char(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_name_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '-' | '.' | '_' | ':' | '\u{b7}')
}

fn is_name(value: &str, allow_colon: bool) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let start_ok = is_name_start_char(first) || (allow_colon && first == ':');
    start_ok && chars.all(|ch| is_name_char(ch) && (allow_colon || ch != ':'))
}

fn is_qname(value: &str) -> bool {
    match value.split_once(':') {
        Some((prefix, local)) => is_name(prefix, false) && is_name(local, false),
        None => is_name(value, false),
    }
}

fn is_language(value: &str) -> bool {
    let mut subtags = value.split('-');
    let primary_ok = subtags.next().is_some_and(|primary| {
        (1..=8).contains(&primary.len()) && primary.bytes().all(|byte| byte.is_ascii_alphabetic())
    });
    primary_ok
        && subtags.all(|subtag| {
            (1..=8).contains(&subtag.len()) && subtag.bytes().all(|byte| byte.is_ascii_alphanumeric())
        })
}

fn is_two_digits(part: &str) -> bool {
    part.len() == 2 && part.bytes().all(|byte| byte.is_ascii_digit())
}

/// Splits a trailing timezone off a temporal value, returning the local part
/// and the offset east of UTC in seconds.
fn split_timezone(value: &str) -> Option<(&str, Option<i64>)> {
    if let Some(rest) = value.strip_suffix('Z') {
        return Some((rest, Some(0)));
    }
    let split = value.len().checked_sub(6);
    let offset = split.and_then(|index| value.get(index..));
    let Some(offset) = offset.filter(|tail| tail.starts_with(['+', '-']) && tail.get(3..4) == Some(":"))
    else {
        return Some((value, None));
    };
    let hours = offset.get(1..3).filter(|part| is_two_digits(part))?.parse::<i64>().ok()?;
    let minutes = offset.get(4..6).filter(|part| is_two_digits(part))?.parse::<i64>().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    let seconds = (hours * 60 + minutes) * 60;
    let signed = if offset.starts_with('-') { -seconds } else { seconds };
    split
        .and_then(|index| value.get(..index))
        .map(|local| (local, Some(signed)))
}

fn parse_date_part(value: &str) -> Option<NaiveDate> {
    let (negative, unsigned) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let mut parts = unsigned.splitn(3, '-');
    let (year, month, day) = (parts.next()?, parts.next()?, parts.next()?);
    let year_ok = year.len() >= 4
        && year.bytes().all(|byte| byte.is_ascii_digit())
        && (year.len() == 4 || !year.starts_with('0'));
    if !year_ok || !is_two_digits(month) || !is_two_digits(day) {
        return None;
    }
    let year_value = year.parse::<i32>().ok()?;
    let signed_year = if negative { -year_value } else { year_value };
    NaiveDate::from_ymd_opt(signed_year, month.parse().ok()?, day.parse().ok()?)
}

fn parse_time_part(value: &str) -> Option<NaiveTime> {
    let mut parts = value.splitn(3, ':');
    let (hours, minutes, seconds) = (parts.next()?, parts.next()?, parts.next()?);
    let (whole_seconds, fraction) = seconds.split_once('.').unwrap_or((seconds, "0"));
    let fraction_ok = !fraction.is_empty() && fraction.bytes().all(|byte| byte.is_ascii_digit());
    if !is_two_digits(hours) || !is_two_digits(minutes) || !is_two_digits(whole_seconds) || !fraction_ok
    {
        return None;
    }
    let nanos = format!("{:0<9}", fraction.get(..9).unwrap_or(fraction))
        .parse::<u32>()
        .ok()?;
    NaiveTime::from_hms_nano_opt(
        hours.parse().ok()?,
        minutes.parse().ok()?,
        whole_seconds.parse().ok()?,
        nanos,
    )
}

fn is_date(value: &str) -> bool {
    split_timezone(value).and_then(|(local, _)| parse_date_part(local)).is_some()
}

fn is_time(value: &str) -> bool {
    split_timezone(value).and_then(|(local, _)| parse_time_part(local)).is_some()
}

fn is_date_time(value: &str) -> bool {
    split_timezone(value)
        .and_then(|(local, _)| local.split_once('T'))
        .is_some_and(|(date, time)| parse_date_part(date).is_some() && parse_time_part(time).is_some())
}

/// Places a `date`, `time` or `dateTime` value on the UTC time line.
///
/// Values without a timezone are read as UTC. A date stands for its first
/// instant; a time of day falls on 1972-12-31.
pub(crate) fn parse_temporal(value: &str) -> Option<NaiveDateTime> {
    let (local, offset) = split_timezone(value)?;
    let moment = if let Some((date, time)) = local.split_once('T') {
        parse_date_part(date)?.and_time(parse_time_part(time)?)
    } else if local.contains(':') {
        NaiveDate::from_ymd_opt(1972, 12, 31)?.and_time(parse_time_part(local)?)
    } else {
        parse_date_part(local)?.and_time(NaiveTime::MIN)
    };
    moment.checked_sub_signed(TimeDelta::seconds(offset.unwrap_or_default()))
}

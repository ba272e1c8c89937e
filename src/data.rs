//! Typed values produced when cell text is converted on demand.

use std::{fmt, str::FromStr};

use anyhow::{Context, anyhow};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Target type of a [`CellConverter::Parse`](crate::convert::CellConverter::Parse).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    Decimal,
    Date,
    DateTime,
    Guid,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Decimal => "decimal",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::Guid => "guid",
        }
    }

    /// Parses non-empty text. Surrounding whitespace is ignored for every
    /// type except `String`, which keeps the text exactly as stored.
    fn parse(self, text: &str) -> anyhow::Result<Value> {
        let trimmed = text.trim();
        let failed = || format!("Failed to parse '{text}' as {self}");
        Ok(match self {
            ColumnType::String => Value::String(text.to_string()),
            ColumnType::Integer => Value::Integer(trimmed.parse().with_context(failed)?),
            ColumnType::Float => Value::Float(trimmed.parse().with_context(failed)?),
            ColumnType::Boolean => Value::Boolean(parse_flag(trimmed).ok_or_else(|| anyhow!(failed()))?),
            ColumnType::Decimal => Value::Decimal(Decimal::from_str(trimmed).with_context(failed)?),
            ColumnType::Date => Value::Date(parse_naive_date(trimmed)?),
            ColumnType::DateTime => Value::DateTime(parse_naive_datetime(trimmed)?),
            ColumnType::Guid => {
                let bare = trimmed.trim_start_matches('{').trim_end_matches('}');
                Value::Guid(Uuid::parse_str(bare).with_context(failed)?)
            }
        })
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "string" | "str" | "text" => Ok(ColumnType::String),
            "integer" | "int" | "i64" => Ok(ColumnType::Integer),
            "float" | "double" | "f64" => Ok(ColumnType::Float),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "decimal" => Ok(ColumnType::Decimal),
            "date" => Ok(ColumnType::Date),
            "datetime" | "timestamp" => Ok(ColumnType::DateTime),
            "guid" | "uuid" => Ok(ColumnType::Guid),
            other => Err(anyhow!("Unknown column type '{other}'")),
        }
    }
}

/// A converted cell. Serializes as the bare JSON value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Decimal(Decimal),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Guid(Uuid),
}

impl Value {
    pub fn as_display(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{v:.0}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Decimal(d) => write!(f, "{}", d.normalize()),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Guid(g) => write!(f, "{g}"),
        }
    }
}

fn parse_flag(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

pub fn parse_naive_date(value: &str) -> anyhow::Result<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .ok_or_else(|| anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> anyhow::Result<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| anyhow!("Failed to parse '{value}' as datetime"))
}

/// Parses cell text as `ty`. Empty text is an absent value, not an error.
pub fn parse_typed_value(value: &str, ty: ColumnType) -> anyhow::Result<Option<Value>> {
    if value.is_empty() {
        return Ok(None);
    }
    ty.parse(value).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_absent_for_every_type() {
        for ty in [ColumnType::String, ColumnType::Integer, ColumnType::Guid] {
            assert_eq!(parse_typed_value("", ty).unwrap(), None);
        }
        assert_eq!(
            parse_typed_value(" 12 ", ColumnType::Integer).unwrap(),
            Some(Value::Integer(12))
        );
        assert_eq!(
            parse_typed_value(" padded ", ColumnType::String).unwrap(),
            Some(Value::String(" padded ".to_string()))
        );
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(
            parse_typed_value("Yes", ColumnType::Boolean).unwrap(),
            Some(Value::Boolean(true))
        );
        assert_eq!(
            parse_typed_value("0", ColumnType::Boolean).unwrap(),
            Some(Value::Boolean(false))
        );
        let err = parse_typed_value("maybe", ColumnType::Boolean).unwrap_err();
        assert_eq!(err.to_string(), "Failed to parse 'maybe' as boolean");
    }

    #[test]
    fn decimals_guids_and_floats_display_compactly() {
        let decimal = parse_typed_value("42.50", ColumnType::Decimal).unwrap().unwrap();
        assert_eq!(decimal.as_display(), "42.5");
        let whole = parse_typed_value("3.0", ColumnType::Float).unwrap().unwrap();
        assert_eq!(whole.to_string(), "3");
        let braced = "{550e8400-e29b-41d4-a716-446655440000}";
        assert!(matches!(
            parse_typed_value(braced, ColumnType::Guid).unwrap(),
            Some(Value::Guid(_))
        ));
        assert!(parse_typed_value("not-a-guid", ColumnType::Guid).is_err());
    }

    #[test]
    fn dates_accept_several_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_naive_date("2024-05-06").unwrap(), expected);
        assert_eq!(parse_naive_date("06/05/2024").unwrap(), expected);
        assert_eq!(parse_naive_date("2024/05/06").unwrap(), expected);
        assert!(parse_naive_datetime("2024-05-06T07:08").is_ok());
    }

    #[test]
    fn column_type_parses_aliases() {
        assert_eq!("INT".parse::<ColumnType>().unwrap(), ColumnType::Integer);
        assert_eq!("uuid".parse::<ColumnType>().unwrap(), ColumnType::Guid);
        assert!("blob".parse::<ColumnType>().is_err());
        assert_eq!(ColumnType::DateTime.to_string(), "datetime");
    }
}

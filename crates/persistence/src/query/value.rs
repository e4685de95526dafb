//! Typed query values.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::mapping::FieldType;

use super::sql::SqlParam;

/// A value bound into a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Null,
}

impl QueryValue {
    /// Converts a raw captured value to `field_type`.
    ///
    /// The error names the expected type.
    pub fn coerce(raw: &str, field_type: FieldType) -> Result<Self, String> {
        let expected = || field_type.to_string();
        match field_type {
            FieldType::String => Ok(QueryValue::String(raw.to_string())),
            FieldType::Integer => raw
                .trim()
                .parse::<i64>()
                .map(QueryValue::Integer)
                .map_err(|_| expected()),
            FieldType::Float => raw
                .trim()
                .parse::<f64>()
                .map(QueryValue::Float)
                .map_err(|_| expected()),
            FieldType::Boolean => match raw.trim() {
                "true" | "1" => Ok(QueryValue::Boolean(true)),
                "false" | "0" => Ok(QueryValue::Boolean(false)),
                _ => Err(expected()),
            },
            FieldType::Date => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map(QueryValue::Date)
                .map_err(|_| expected()),
            FieldType::DateTime => parse_datetime(raw)
                .map(QueryValue::DateTime)
                .ok_or_else(expected),
            FieldType::Uuid => uuid::Uuid::parse_str(raw.trim())
                .map(|id| QueryValue::String(id.hyphenated().to_string()))
                .map_err(|_| expected()),
        }
    }

    /// Value as stored in documents. Dates become ISO-8601 strings.
    pub fn to_json(&self) -> Value {
        match self {
            QueryValue::String(s) => Value::String(s.clone()),
            QueryValue::Integer(i) => Value::from(*i),
            QueryValue::Float(f) => Value::from(*f),
            QueryValue::Boolean(b) => Value::Bool(*b),
            QueryValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            QueryValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
            QueryValue::Null => Value::Null,
        }
    }

    /// Value as bound to a SQL statement.
    pub fn to_sql_param(&self) -> SqlParam {
        match self {
            QueryValue::String(s) => SqlParam::string(s.clone()),
            QueryValue::Integer(i) => SqlParam::integer(*i),
            QueryValue::Float(f) => SqlParam::float(*f),
            QueryValue::Boolean(b) => SqlParam::integer(i64::from(*b)),
            QueryValue::Date(d) => SqlParam::string(d.format("%Y-%m-%d").to_string()),
            QueryValue::DateTime(dt) => SqlParam::string(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            QueryValue::Null => SqlParam::Null,
        }
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            QueryValue::Integer(i) => write!(f, "{}", i),
            QueryValue::Float(v) => write!(f, "{}", v),
            QueryValue::Boolean(b) => write!(f, "{}", b),
            QueryValue::Date(d) => write!(f, "'{}'", d.format("%Y-%m-%d")),
            QueryValue::DateTime(dt) => write!(f, "'{}'", dt.to_rfc3339()),
            QueryValue::Null => f.write_str("NULL"),
        }
    }
}

/// Parses RFC 3339 timestamps, naive timestamps (taken as UTC) and plain dates
/// (midnight UTC).
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

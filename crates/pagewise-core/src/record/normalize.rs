//! Ingestion boundary between the store client and the access layer.
//!
//! Every coercion of raw document fields (dates, money, numeric strings,
//! identifiers) happens here and only here. Filters, the overlay, and the
//! engine only ever see normalized [`Value`]s.

use crate::{
    error::AccessError,
    record::{Record, RecordPatch},
    value::{Timestamp, Value},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as JsonValue};
use std::{collections::BTreeMap, str::FromStr};
use thiserror::Error as ThisError;
use tracing::warn;

///
/// FieldKind
///
/// Declared coercion target for one schema field.
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Identifier,
    Integer,
    Money,
    Text,
    Timestamp,
}

impl FieldKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Identifier => "identifier",
            Self::Integer => "integer",
            Self::Money => "money",
            Self::Text => "text",
            Self::Timestamp => "timestamp",
        }
    }
}

///
/// CoercionError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("field '{field}' expects {expected}, got '{found}'")]
pub struct CoercionError {
    pub field: String,
    pub expected: &'static str,
    pub found: String,
}

///
/// RawDocument
///
/// Document exactly as the store client returned it.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, JsonValue>,
}

impl RawDocument {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: JsonValue) -> Self {
        self.fields.insert(field.into(), value);
        self
    }
}

///
/// Normalizer
///
/// Field-kind driven coercion shared by store ingestion, overlay patches,
/// and user-entered criteria.
///

#[derive(Clone, Debug, Default)]
pub struct Normalizer {
    kinds: BTreeMap<String, FieldKind>,
}

impl Normalizer {
    #[must_use]
    pub fn new(kinds: impl IntoIterator<Item = (String, FieldKind)>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn kind_of(&self, field: &str) -> Option<FieldKind> {
        self.kinds.get(field).copied()
    }

    /// Normalize one fetched document.
    ///
    /// Fetched data is never rejected wholesale: a declared field that fails
    /// coercion is kept as `Null` and logged.
    #[must_use]
    pub fn record(&self, doc: RawDocument) -> Record {
        let mut record = Record::new(doc.id.as_str());

        for (name, raw) in doc.fields {
            let value = match self.field(&name, &raw) {
                Ok(value) => value,
                Err(err) => {
                    warn!(record = %doc.id, error = %err, "field coercion failed on ingest");
                    Value::Null
                }
            };
            record = record.with_field(name, value);
        }

        record
    }

    /// Normalize a confirmed partial update. JSON `null` unsets the field.
    pub fn patch(&self, raw: &Map<String, JsonValue>) -> Result<RecordPatch, AccessError> {
        let mut patch = RecordPatch::new();
        for (name, value) in raw {
            if value.is_null() {
                patch = patch.unset(name.as_str());
                continue;
            }
            let value = self
                .field(name, value)
                .map_err(|err| AccessError::criteria_invalid(err.to_string()))?;
            patch = patch.set(name.as_str(), value);
        }

        Ok(patch)
    }

    /// Coerce one raw JSON field according to its declared kind.
    pub fn field(&self, name: &str, raw: &JsonValue) -> Result<Value, CoercionError> {
        let Some(kind) = self.kind_of(name) else {
            return Ok(structural(raw));
        };
        if raw.is_null() {
            return Ok(Value::Null);
        }

        let coerced = match (kind, raw) {
            (FieldKind::Text, JsonValue::String(text)) => Some(Value::Text(text.clone())),
            (FieldKind::Text, JsonValue::Number(n)) => Some(Value::Text(n.to_string())),
            (FieldKind::Identifier, JsonValue::String(text)) => {
                Some(Value::Text(text.trim().to_string()))
            }
            (FieldKind::Identifier, JsonValue::Number(n)) if n.is_i64() || n.is_u64() => {
                Some(Value::Text(n.to_string()))
            }
            (FieldKind::Integer, JsonValue::Number(n)) => n.as_i64().map(Value::Int),
            (FieldKind::Integer, JsonValue::String(text)) => parse_integer(text),
            (FieldKind::Money, JsonValue::Number(n)) => number_to_decimal(n).map(Value::Decimal),
            (FieldKind::Money, JsonValue::String(text)) => parse_money(text).map(Value::Decimal),
            (FieldKind::Timestamp, JsonValue::String(text)) => {
                parse_timestamp(text).map(Value::Timestamp)
            }
            (FieldKind::Timestamp, JsonValue::Number(n)) => {
                n.as_i64().map(|ms| Value::Timestamp(Timestamp::from_millis(ms)))
            }
            (FieldKind::Timestamp, JsonValue::Object(parts)) => {
                timestamp_from_parts(parts).map(Value::Timestamp)
            }
            _ => None,
        };

        coerced.ok_or_else(|| CoercionError {
            field: name.to_string(),
            expected: kind.label(),
            found: raw.to_string(),
        })
    }

    /// Coerce one user-entered criterion value for `field`.
    pub fn criterion(&self, name: &str, raw: &str) -> Result<Value, CoercionError> {
        let trimmed = raw.trim();
        let coerced = match self.kind_of(name) {
            None | Some(FieldKind::Text | FieldKind::Identifier) => {
                Some(Value::Text(trimmed.to_string()))
            }
            Some(FieldKind::Integer) => parse_integer(trimmed),
            Some(FieldKind::Money) => parse_money(trimmed).map(Value::Decimal),
            Some(FieldKind::Timestamp) => parse_timestamp(trimmed).map(Value::Timestamp),
        };

        coerced.ok_or_else(|| CoercionError {
            field: name.to_string(),
            expected: self.kind_of(name).map_or("text", FieldKind::label),
            found: trimmed.to_string(),
        })
    }
}

// Convert undeclared JSON into a value without any coercion.
fn structural(raw: &JsonValue) -> Value {
    match raw {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(v) => Value::Bool(*v),
        JsonValue::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| number_to_decimal(n).map(Value::Decimal))
            .unwrap_or(Value::Null),
        JsonValue::String(text) => Value::Text(text.clone()),
        JsonValue::Array(items) => Value::List(items.iter().map(structural).collect()),
        JsonValue::Object(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), structural(v)))
                .collect(),
        ),
    }
}

fn parse_integer(raw: &str) -> Option<Value> {
    raw.trim().parse::<i64>().ok().map(Value::Int)
}

fn number_to_decimal(n: &Number) -> Option<Decimal> {
    Decimal::from_str(&n.to_string())
        .ok()
        .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok()))
}

// Dates arrive as RFC 3339 instants or bare `YYYY-MM-DD` days.
fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();

    Timestamp::parse_rfc3339(raw).or_else(|| Timestamp::parse_date(raw))
}

fn timestamp_from_parts(parts: &Map<String, JsonValue>) -> Option<Timestamp> {
    let seconds = parts
        .get("seconds")
        .or_else(|| parts.get("_seconds"))?
        .as_i64()?;
    let nanos = parts
        .get("nanoseconds")
        .or_else(|| parts.get("_nanoseconds"))
        .and_then(JsonValue::as_u64)
        .unwrap_or(0);

    Some(Timestamp::from_parts(seconds, u32::try_from(nanos).ok()?))
}

/// Parse a human-entered money amount.
///
/// Currency symbols and whitespace are ignored. When both `.` and `,` occur,
/// the last one is the decimal separator. A single separator kind is a
/// thousands separator if it repeats or is followed by exactly three digits.
fn parse_money(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');
    let decimal_sep = match (last_dot, last_comma) {
        (Some(d), Some(c)) => Some(if d > c { '.' } else { ',' }),
        (Some(_), None) => single_separator_decimal(&cleaned, '.'),
        (None, Some(_)) => single_separator_decimal(&cleaned, ','),
        (None, None) => None,
    };

    let mut canonical = String::with_capacity(cleaned.len());
    for c in cleaned.chars() {
        match c {
            '.' | ',' if Some(c) == decimal_sep => canonical.push('.'),
            '.' | ',' => {}
            other => canonical.push(other),
        }
    }

    Decimal::from_str(&canonical).ok()
}

fn single_separator_decimal(cleaned: &str, sep: char) -> Option<char> {
    let count = cleaned.matches(sep).count();
    let tail = cleaned.rsplit(sep).next().unwrap_or_default();

    if count > 1 || tail.len() == 3 {
        None
    } else {
        Some(sep)
    }
}

///
/// TESTS
///

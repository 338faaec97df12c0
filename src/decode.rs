use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

/// An untyped JSON object as received from the transport.
pub type JsonObject = Map<String, Value>;

/// GitHub timestamps are always UTC with a literal `Z` suffix.
/// No other offsets are accepted.
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Required key '{0}' missing")]
    MissingKey(String),

    #[error("Unexpected type '{actual}' was supplied for '{key}: {expected}'")]
    UnexpectedType {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Cannot parse URL '{value}' for key '{key}'")]
    UnparsableUrl { key: String, value: String },

    #[error("Cannot parse date '{value}' for key '{key}'")]
    UnparsableDate { key: String, value: String },
}

/// A record type that can be built from an untyped JSON object.
///
/// Construction is all-or-nothing: either every required field decodes
/// or the whole record fails with the first error encountered.
pub trait FromJson: Sized {
    fn from_json(json: &JsonObject) -> Result<Self, DecodeError>;
}

/// A primitive that can be extracted from a single JSON value.
pub trait FieldType: Sized {
    /// Type name used in `UnexpectedType` messages (e.g. "integer").
    const EXPECTED: &'static str;

    fn pick(value: &Value) -> Option<Self>;
}

impl FieldType for u64 {
    const EXPECTED: &'static str = "integer";

    fn pick(value: &Value) -> Option<Self> {
        value.as_u64()
    }
}

impl FieldType for i64 {
    const EXPECTED: &'static str = "integer";

    fn pick(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FieldType for f64 {
    const EXPECTED: &'static str = "number";

    fn pick(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FieldType for bool {
    const EXPECTED: &'static str = "boolean";

    fn pick(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FieldType for String {
    const EXPECTED: &'static str = "string";

    fn pick(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

/// JSON type name of a value, for error messages.
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Extract a required primitive field.
pub fn required<T: FieldType>(json: &JsonObject, key: &str) -> Result<T, DecodeError> {
    let value = json
        .get(key)
        .ok_or_else(|| DecodeError::MissingKey(key.to_string()))?;
    T::pick(value).ok_or_else(|| DecodeError::UnexpectedType {
        key: key.to_string(),
        expected: T::EXPECTED,
        actual: type_name(value),
    })
}

/// Extract an optional primitive field. Absent keys and JSON null both
/// decode to `None`; a present non-null value must match the expected type.
pub fn optional<T: FieldType>(json: &JsonObject, key: &str) -> Result<Option<T>, DecodeError> {
    match json.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => T::pick(value)
            .map(Some)
            .ok_or_else(|| DecodeError::UnexpectedType {
                key: key.to_string(),
                expected: T::EXPECTED,
                actual: type_name(value),
            }),
    }
}

pub fn required_url(json: &JsonObject, key: &str) -> Result<Url, DecodeError> {
    let raw: String = required(json, key)?;
    Url::parse(&raw).map_err(|_| DecodeError::UnparsableUrl {
        key: key.to_string(),
        value: raw,
    })
}

/// None of the current record types carry an optional URL, but the decoder
/// set stays symmetric with the date helpers.
#[allow(dead_code)]
pub fn optional_url(json: &JsonObject, key: &str) -> Result<Option<Url>, DecodeError> {
    let Some(raw) = optional::<String>(json, key)? else {
        return Ok(None);
    };
    Url::parse(&raw)
        .map(Some)
        .map_err(|_| DecodeError::UnparsableUrl {
            key: key.to_string(),
            value: raw,
        })
}

pub fn required_date(json: &JsonObject, key: &str) -> Result<DateTime<Utc>, DecodeError> {
    let raw: String = required(json, key)?;
    parse_date(&raw).ok_or_else(|| DecodeError::UnparsableDate {
        key: key.to_string(),
        value: raw,
    })
}

pub fn optional_date(json: &JsonObject, key: &str) -> Result<Option<DateTime<Utc>>, DecodeError> {
    let Some(raw) = optional::<String>(json, key)? else {
        return Ok(None);
    };
    match parse_date(&raw) {
        Some(date) => Ok(Some(date)),
        None => Err(DecodeError::UnparsableDate {
            key: key.to_string(),
            value: raw,
        }),
    }
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Extract a required nested JSON object, for records within records.
pub fn required_object<'a>(json: &'a JsonObject, key: &str) -> Result<&'a JsonObject, DecodeError> {
    let value = json
        .get(key)
        .ok_or_else(|| DecodeError::MissingKey(key.to_string()))?;
    value.as_object().ok_or_else(|| DecodeError::UnexpectedType {
        key: key.to_string(),
        expected: "object",
        actual: type_name(value),
    })
}

/// Extract a required array field and decode every element in order.
/// Aborts on the first element that fails, propagating its error unchanged.
pub fn required_items<T: FromJson>(json: &JsonObject, key: &str) -> Result<Vec<T>, DecodeError> {
    let value = json
        .get(key)
        .ok_or_else(|| DecodeError::MissingKey(key.to_string()))?;
    let elements = value.as_array().ok_or_else(|| DecodeError::UnexpectedType {
        key: key.to_string(),
        expected: "array",
        actual: type_name(value),
    })?;

    let mut items = Vec::with_capacity(elements.len());
    for element in elements {
        let object = element
            .as_object()
            .ok_or_else(|| DecodeError::UnexpectedType {
                key: key.to_string(),
                expected: "object",
                actual: type_name(element),
            })?;
        items.push(T::from_json(object)?);
    }
    Ok(items)
}

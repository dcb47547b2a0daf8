//! Storage → transport adapter.
//!
//! DynamoDB hands numbers back as decimal strings. Everything leaving the handler
//! goes through [`attribute_to_json`], which turns them into JSON floats at any
//! nesting depth. Binary attributes are rendered as standard base64.

use aws_sdk_dynamodb::types::AttributeValue;
use base64::{engine::general_purpose, Engine as _};
use serde_json::{Map, Number, Value};

use crate::error::ConversionError;
use crate::store::Record;

pub fn attribute_to_json(value: &AttributeValue) -> Result<Value, ConversionError> {
    Ok(match value {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => number_to_json(n)?,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::B(blob) => Value::String(general_purpose::STANDARD.encode(blob.as_ref())),
        AttributeValue::Ss(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
        AttributeValue::Ns(items) => Value::Array(
            items
                .iter()
                .map(|n| number_to_json(n))
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::Bs(items) => Value::Array(
            items
                .iter()
                .map(|blob| Value::String(general_purpose::STANDARD.encode(blob.as_ref())))
                .collect(),
        ),
        AttributeValue::L(items) => Value::Array(
            items
                .iter()
                .map(attribute_to_json)
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::M(map) => Value::Object(map_to_json(map)?),
        other => return Err(ConversionError::Unsupported(format!("{other:?}"))),
    })
}

/// Render a whole record as a JSON object.
pub fn record_to_json(record: &Record) -> Result<Value, ConversionError> {
    map_to_json(record).map(Value::Object)
}

/// Render a sequence of records as a JSON array, preserving order.
pub fn records_to_json(records: &[Record]) -> Result<Value, ConversionError> {
    records
        .iter()
        .map(record_to_json)
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn map_to_json(map: &Record) -> Result<Map<String, Value>, ConversionError> {
    map.iter()
        .map(|(k, v)| attribute_to_json(v).map(|json| (k.clone(), json)))
        .collect()
}

fn number_to_json(raw: &str) -> Result<Value, ConversionError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| ConversionError::InvalidNumber(raw.to_string()))
}

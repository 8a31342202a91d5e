//! Boundary parsing of remote payloads into typed records.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;

use super::api_types::{ApiBatch, ApiNewsItem, ApiProduct};
use super::types::{Domain, Record};
use crate::error::PayloadError;

/// Envelope keys accepted around a record array, besides the domain name.
const ENVELOPE_KEYS: [&str; 2] = ["data", "items"];

/// Parse a remote JSON payload into records for `domain`.
///
/// Accepts a bare array or an object with exactly one array under `data`,
/// `items`, or the domain name. Any other shape, any element that fails to
/// deserialize, or a repeated id rejects the whole payload.
pub fn parse_payload(domain: Domain, payload: Value) -> Result<Vec<Record>, PayloadError> {
  let items = unwrap_envelope(domain, payload)?;

  let records = match domain {
    Domain::Products => parse_items::<ApiProduct>(domain, items, ApiProduct::into_record)?,
    Domain::News => parse_items::<ApiNewsItem>(domain, items, ApiNewsItem::into_record)?,
    Domain::Batches => parse_items::<ApiBatch>(domain, items, ApiBatch::into_record)?,
  };

  let mut seen = HashSet::with_capacity(records.len());
  for record in &records {
    if !seen.insert(record.id.store_key()) {
      return Err(PayloadError::DuplicateId(record.id.to_string()));
    }
  }

  Ok(records)
}

fn unwrap_envelope(domain: Domain, payload: Value) -> Result<Vec<Value>, PayloadError> {
  match payload {
    Value::Array(items) => Ok(items),
    Value::Object(mut map) => {
      let found: Vec<&str> = ENVELOPE_KEYS
        .iter()
        .copied()
        .chain(std::iter::once(domain.as_str()))
        .filter(|k| map.contains_key(*k))
        .collect();

      match found.as_slice() {
        [key] => match map.remove(*key) {
          Some(Value::Array(items)) => Ok(items),
          Some(other) => Err(PayloadError::Shape(format!(
            "'{}' is {}, expected an array",
            key,
            type_name(&other)
          ))),
          None => Err(PayloadError::Shape(format!("'{}' vanished", key))),
        },
        [] => Err(PayloadError::Shape(format!(
          "object without a '{}', 'data' or 'items' array",
          domain
        ))),
        many => Err(PayloadError::Shape(format!(
          "ambiguous envelope with keys {:?}",
          many
        ))),
      }
    }
    other => Err(PayloadError::Shape(format!(
      "{}, expected an array or object",
      type_name(&other)
    ))),
  }
}

fn parse_items<T: DeserializeOwned>(
  domain: Domain,
  items: Vec<Value>,
  convert: fn(T) -> Record,
) -> Result<Vec<Record>, PayloadError> {
  items
    .into_iter()
    .enumerate()
    .map(|(index, item)| {
      serde_json::from_value::<T>(item)
        .map(convert)
        .map_err(|e| PayloadError::InvalidRecord {
          domain: domain.as_str(),
          index,
          reason: e.to_string(),
        })
    })
    .collect()
}

fn type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}

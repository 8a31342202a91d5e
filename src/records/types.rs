use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::image::Partition;

/// An independent data category with its own store namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
  Products,
  News,
  Batches,
}

impl Domain {
  pub const ALL: [Domain; 3] = [Domain::Products, Domain::News, Domain::Batches];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Products => "products",
      Self::News => "news",
      Self::Batches => "batches",
    }
  }

  /// Image partition for records in this domain, if the domain carries images.
  pub fn image_partition(&self) -> Option<Partition> {
    match self {
      Self::Products => Some(Partition::Product),
      Self::News => Some(Partition::News),
      Self::Batches => None,
    }
  }
}

impl fmt::Display for Domain {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for Domain {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "products" | "product" => Ok(Self::Products),
      "news" => Ok(Self::News),
      "batches" | "batch" => Ok(Self::Batches),
      other => Err(format!("unknown domain '{}'", other)),
    }
  }
}

/// Natural key of a record. Integer and string ids with the same text
/// address the same row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
  Int(i64),
  Text(String),
}

impl RecordId {
  /// The form used as the store key.
  pub fn store_key(&self) -> String {
    self.to_string()
  }
}

impl fmt::Display for RecordId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Int(n) => write!(f, "{}", n),
      Self::Text(s) => f.write_str(s),
    }
  }
}

impl From<i64> for RecordId {
  fn from(n: i64) -> Self {
    Self::Int(n)
  }
}

impl From<&str> for RecordId {
  fn from(s: &str) -> Self {
    Self::Text(s.to_string())
  }
}

impl From<String> for RecordId {
  fn from(s: String) -> Self {
    Self::Text(s)
  }
}

/// A normalized entity belonging to a domain.
///
/// Equality is structural: attribute maps compare without regard to key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
  pub id: RecordId,
  #[serde(default)]
  pub attributes: Map<String, Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image_url: Option<String>,
}

impl Record {
  pub fn new(id: impl Into<RecordId>) -> Self {
    Self {
      id: id.into(),
      attributes: Map::new(),
      image_url: None,
    }
  }

  /// Builder-style attribute setter.
  pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
    self.attributes.insert(field.to_string(), value.into());
    self
  }

  pub fn with_image(mut self, url: impl Into<String>) -> Self {
    self.image_url = Some(url.into());
    self
  }

  pub fn attr(&self, field: &str) -> Option<&Value> {
    self.attributes.get(field)
  }

  pub fn attr_str(&self, field: &str) -> Option<&str> {
    self.attributes.get(field).and_then(Value::as_str)
  }
}

//! Serde-deserializable types matching the upstream data sources.
//!
//! These are kept apart from [`Record`] so the boundary can be strict about
//! shape while the store works with one generic record type.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::types::{Record, RecordId};

// ============================================================================
// Products (WooCommerce-shaped)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiPrice {
  Text(String),
  Number(serde_json::Number),
}

impl ApiPrice {
  fn into_string(self) -> String {
    match self {
      Self::Text(s) => s,
      Self::Number(n) => n.to_string(),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiImage {
  pub src: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiProduct {
  pub id: i64,
  pub name: String,
  pub price: Option<ApiPrice>,
  pub stock_quantity: Option<i64>,
  pub stock_status: Option<String>,
  #[serde(default)]
  pub images: Vec<ApiImage>,
}

impl ApiProduct {
  pub fn into_record(self) -> Record {
    let mut attributes = Map::new();
    attributes.insert("name".into(), Value::String(self.name));
    attributes.insert(
      "price".into(),
      self
        .price
        .map(|p| Value::String(p.into_string()))
        .unwrap_or(Value::Null),
    );
    attributes.insert(
      "stock_quantity".into(),
      self.stock_quantity.map(Value::from).unwrap_or(Value::Null),
    );
    attributes.insert(
      "stock_status".into(),
      self.stock_status.map(Value::String).unwrap_or(Value::Null),
    );

    Record {
      id: RecordId::Int(self.id),
      attributes,
      image_url: self.images.into_iter().next().and_then(|i| remote_url(i.src)),
    }
  }
}

// ============================================================================
// News (Atom entries, normalized upstream)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiNewsItem {
  pub news_id: String,
  pub title: String,
  pub link: String,
  pub author: Option<String>,
  #[serde(default)]
  pub categories: Vec<String>,
  pub published: String,
  pub updated: Option<String>,
  pub summary: Option<String>,
  pub image_url: Option<String>,
}

impl ApiNewsItem {
  pub fn into_record(self) -> Record {
    let mut attributes = Map::new();
    attributes.insert("title".into(), Value::String(self.title));
    attributes.insert("link".into(), Value::String(self.link));
    attributes.insert(
      "author".into(),
      self.author.map(Value::String).unwrap_or(Value::Null),
    );
    attributes.insert(
      "categories".into(),
      Value::Array(self.categories.into_iter().map(Value::String).collect()),
    );
    attributes.insert("published".into(), Value::String(self.published));
    attributes.insert(
      "updated".into(),
      self.updated.map(Value::String).unwrap_or(Value::Null),
    );
    attributes.insert(
      "summary".into(),
      self.summary.map(Value::String).unwrap_or(Value::Null),
    );

    Record {
      id: RecordId::Text(self.news_id),
      attributes,
      image_url: self.image_url.and_then(remote_url),
    }
  }
}

// ============================================================================
// Batches (sheet rows, image-free)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiBatch {
  pub batch_id: RecordId,
  pub region_id: RecordId,
  // Remaining sheet columns are carried as-is
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl ApiBatch {
  pub fn into_record(self) -> Record {
    let mut attributes = self.extra;
    let region = match self.region_id {
      RecordId::Int(n) => Value::from(n),
      RecordId::Text(s) => Value::String(s),
    };
    attributes.insert("region_id".into(), region);

    Record {
      id: self.batch_id,
      attributes,
      image_url: None,
    }
  }
}

/// Keep only absolute http(s) URLs as image references.
fn remote_url(raw: String) -> Option<String> {
  let trimmed = raw.trim();
  if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
    Some(trimmed.to_string())
  } else {
    None
  }
}

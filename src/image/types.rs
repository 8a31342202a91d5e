use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A logically separate image cache partition.
///
/// The same URL cached under two partitions yields two independent entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
  Product,
  News,
  Generic,
}

impl Partition {
  pub const ALL: [Partition; 3] = [Partition::Product, Partition::News, Partition::Generic];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Product => "product",
      Self::News => "news",
      Self::Generic => "generic",
    }
  }
}

impl fmt::Display for Partition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for Partition {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "product" | "products" => Ok(Self::Product),
      "news" => Ok(Self::News),
      "generic" => Ok(Self::Generic),
      other => Err(format!("unknown image partition '{}'", other)),
    }
  }
}

/// A cached image blob with its validation metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedImage {
  pub partition: Partition,
  /// sha256 hex of the canonical source URL
  pub key: String,
  pub source_url: String,
  pub blob: Vec<u8>,
  /// sha256 hex of `blob`
  pub blob_hash: String,
  pub etag: Option<String>,
  /// Last successful fetch or validation
  pub updated_at: DateTime<Utc>,
}

/// Bytes returned by an image resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
  pub bytes: Vec<u8>,
  pub etag: Option<String>,
}

/// Lightweight remote validators for an image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RemoteMetadata {
  pub hash: Option<String>,
  pub etag: Option<String>,
}

impl RemoteMetadata {
  /// Whether these validators prove `image` is unchanged.
  pub fn matches(&self, image: &CachedImage) -> bool {
    let hash_match = self
      .hash
      .as_deref()
      .is_some_and(|h| h.eq_ignore_ascii_case(&image.blob_hash));
    let etag_match = match (self.etag.as_deref(), image.etag.as_deref()) {
      (Some(remote), Some(stored)) => remote == stored,
      _ => false,
    };
    hash_match || etag_match
  }
}

/// What to display for an image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplaySource {
  /// A locally created object URL backed by the cached blob
  Local { object_url: String },
  /// A remote URL (proxied when a proxy is configured)
  Remote { url: String },
}

impl DisplaySource {
  pub fn url(&self) -> &str {
    match self {
      Self::Local { object_url } => object_url,
      Self::Remote { url } => url,
    }
  }

  pub fn is_local(&self) -> bool {
    matches!(self, Self::Local { .. })
  }
}

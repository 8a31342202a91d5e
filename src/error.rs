//! Error types for the cache and sync core.

use thiserror::Error;

use crate::records::Domain;

/// Errors from the local content store and image partitions.
#[derive(Debug, Error)]
pub enum StoreError {
  /// The store could not be opened or locked. Callers treat this as an
  /// empty store that cannot persist.
  #[error("local storage unavailable: {0}")]
  StorageUnavailable(String),

  #[error("serialization error: {0}")]
  Serialization(String),

  #[error("storage backend error: {0}")]
  Backend(String),
}

impl From<rusqlite::Error> for StoreError {
  fn from(e: rusqlite::Error) -> Self {
    Self::Backend(e.to_string())
  }
}

impl From<serde_json::Error> for StoreError {
  fn from(e: serde_json::Error) -> Self {
    Self::Serialization(e.to_string())
  }
}

/// A remote payload that did not have the expected shape.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
  #[error("unexpected payload shape: {0}")]
  Shape(String),

  #[error("invalid {domain} record at index {index}: {reason}")]
  InvalidRecord {
    domain: &'static str,
    index: usize,
    reason: String,
  },

  #[error("duplicate id {0} in payload")]
  DuplicateId(String),
}

/// Errors from a remote sync attempt.
#[derive(Debug, Error)]
pub enum SyncError {
  #[error("remote unreachable: {0}")]
  RemoteUnreachable(String),

  #[error("no remote source configured for {0}")]
  NoSource(Domain),

  #[error("malformed remote payload: {0}")]
  MalformedPayload(#[from] PayloadError),

  #[error(transparent)]
  Storage(#[from] StoreError),
}

/// A single image resolver failing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
  #[error("http status {0}")]
  Status(u16),

  #[error("network error: {0}")]
  Network(String),

  #[error("blocked insecure url under mixed-content policy")]
  MixedContent,

  #[error("empty response body")]
  EmptyBody,
}

/// Every resolver in a fallback chain failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("image fetch failed after {} attempt(s): {}", attempts.len(), attempts.join("; "))]
pub struct ImageFetchFailed {
  pub attempts: Vec<String>,
}

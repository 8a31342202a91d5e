//! Locally created display references for cached blobs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::types::Partition;

/// Registry of `blob:` URLs handed out for display.
///
/// Each call to [`create`](Self::create) pins a copy of the bytes until the
/// URL is revoked. Releasing URLs that are no longer shown is the caller's job.
#[derive(Debug, Default)]
pub struct ObjectUrlRegistry {
  next_id: AtomicU64,
  urls: Mutex<HashMap<String, Arc<[u8]>>>,
}

impl ObjectUrlRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn create(&self, partition: Partition, key: &str, bytes: Vec<u8>) -> String {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let short_key: String = key.chars().take(16).collect();
    let url = format!("blob:larder/{}/{}-{}", partition, short_key, id);

    self
      .urls
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(url.clone(), Arc::from(bytes));
    url
  }

  /// Bytes behind a live object URL.
  pub fn get(&self, url: &str) -> Option<Arc<[u8]>> {
    self
      .urls
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(url)
      .cloned()
  }

  /// Release one URL. Returns whether it was live.
  pub fn revoke(&self, url: &str) -> bool {
    self
      .urls
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(url)
      .is_some()
  }

  /// Release every URL, e.g. when the displayed record set is replaced.
  pub fn revoke_all(&self) -> usize {
    let mut urls = self.urls.lock().unwrap_or_else(PoisonError::into_inner);
    let count = urls.len();
    urls.clear();
    count
  }

  pub fn len(&self) -> usize {
    self
      .urls
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_create_get_revoke() {
    let registry = ObjectUrlRegistry::new();
    let url = registry.create(Partition::Product, "abcdef", vec![9, 9]);

    assert!(url.starts_with("blob:larder/product/abcdef-"));
    assert_eq!(registry.get(&url).as_deref(), Some(&[9u8, 9][..]));

    assert!(registry.revoke(&url));
    assert!(!registry.revoke(&url));
    assert!(registry.get(&url).is_none());
  }

  #[test]
  fn test_urls_are_unique_per_create() {
    let registry = ObjectUrlRegistry::new();
    let a = registry.create(Partition::News, "k", vec![1]);
    let b = registry.create(Partition::News, "k", vec![1]);
    assert_ne!(a, b);
    assert_eq!(registry.revoke_all(), 2);
    assert!(registry.is_empty());
  }
}

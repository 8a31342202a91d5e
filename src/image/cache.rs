//! Content-addressed image cache with TTL and hash-based validation.

use chrono::Duration;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};
use url::Url;

use super::fetch::{proxied_url, FallbackChain, MetadataProbe};
use super::key::{cache_key, sha256_hex};
use super::object_url::ObjectUrlRegistry;
use super::types::{CachedImage, DisplaySource, Partition};
use crate::clock::Clock;
use crate::error::StoreError;
use crate::store::ImageStore;

/// Retention windows per partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
  pub product: Duration,
  pub news: Duration,
  pub generic: Duration,
  /// Age past which the sweep deletes an entry outright
  pub sweep: Duration,
}

impl Default for CacheTtls {
  fn default() -> Self {
    Self {
      product: Duration::days(7),
      news: Duration::days(30),
      generic: Duration::days(7),
      sweep: Duration::days(90),
    }
  }
}

impl CacheTtls {
  /// Soft staleness window; older entries are revalidated before use.
  pub fn soft(&self, partition: Partition) -> Duration {
    match partition {
      Partition::Product => self.product,
      Partition::News => self.news,
      Partition::Generic => self.generic,
    }
  }
}

/// What an `ensure_cached` call ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
  /// Entry within its TTL, no network used
  Fresh,
  /// Remote validators matched the stored entry, body not downloaded
  Validated,
  /// Body downloaded but identical to the stored blob; no blob write
  Unchanged,
  /// New or changed blob written
  Stored,
  /// Every resolver failed; cache left as it was
  FetchFailed,
  /// Local storage failed; cache left as it was
  StorageFailed,
}

type InflightTask = Shared<BoxFuture<'static, CacheOutcome>>;

/// Image blob cache layered over an [`ImageStore`].
///
/// Concurrent calls for the same partition, URL and force flag share one
/// in-flight refresh, so N simultaneous requests cost one download.
pub struct ImageCache {
  store: Arc<dyn ImageStore>,
  chain: FallbackChain,
  probe: Option<Arc<dyn MetadataProbe>>,
  proxy: Option<Url>,
  ttls: CacheTtls,
  clock: Arc<dyn Clock>,
  object_urls: ObjectUrlRegistry,
  inflight: Mutex<HashMap<String, InflightTask>>,
}

impl ImageCache {
  pub fn new(store: Arc<dyn ImageStore>, chain: FallbackChain, clock: Arc<dyn Clock>) -> Self {
    Self {
      store,
      chain,
      probe: None,
      proxy: None,
      ttls: CacheTtls::default(),
      clock,
      object_urls: ObjectUrlRegistry::new(),
      inflight: Mutex::new(HashMap::new()),
    }
  }

  pub fn with_probe(mut self, probe: Arc<dyn MetadataProbe>) -> Self {
    self.probe = Some(probe);
    self
  }

  /// Proxy used to build the remote display URL for uncached images.
  pub fn with_proxy(mut self, proxy: Option<Url>) -> Self {
    self.proxy = proxy;
    self
  }

  pub fn with_ttls(mut self, ttls: CacheTtls) -> Self {
    self.ttls = ttls;
    self
  }

  pub fn object_urls(&self) -> &ObjectUrlRegistry {
    &self.object_urls
  }

  /// Make sure `source_url` is cached and reasonably fresh.
  ///
  /// Never fails; problems are logged and the existing entry is kept.
  pub async fn ensure_cached(self: &Arc<Self>, source_url: &str, partition: Partition) -> CacheOutcome {
    self.ensure_cached_with(source_url, partition, false).await
  }

  /// As [`ensure_cached`](Self::ensure_cached); `force` skips the freshness
  /// checks and always writes the downloaded blob.
  pub async fn ensure_cached_with(
    self: &Arc<Self>,
    source_url: &str,
    partition: Partition,
    force: bool,
  ) -> CacheOutcome {
    // A forced call only joins another forced refresh
    let mode = if force { "forced" } else { "plain" };
    let slot = format!("{}:{}:{}", partition, cache_key(source_url), mode);

    let task = {
      let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
      if let Some(task) = inflight.get(&slot).cloned() {
        debug!(url = source_url, %partition, "joining in-flight image refresh");
        task
      } else {
        let this = Arc::clone(self);
        let url = source_url.to_string();
        let slot_key = slot.clone();
        let task = async move {
          let outcome = this.refresh(&url, partition, force).await;
          this
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&slot_key);
          outcome
        }
        .boxed()
        .shared();
        inflight.insert(slot, task.clone());
        task
      }
    };

    task.await
  }

  async fn refresh(&self, source_url: &str, partition: Partition, force: bool) -> CacheOutcome {
    let key = cache_key(source_url);

    let existing = match self.lookup(partition, &key, source_url) {
      Ok(existing) => existing,
      Err(e) => {
        warn!(url = source_url, error = %e, "image cache unavailable");
        return CacheOutcome::StorageFailed;
      }
    };

    let now = self.clock.now();

    if !force {
      if let Some(entry) = &existing {
        if now - entry.updated_at <= self.ttls.soft(partition) {
          return CacheOutcome::Fresh;
        }

        if let Some(probe) = &self.probe {
          if let Some(metadata) = probe.probe(source_url).await {
            if metadata.matches(entry) {
              debug!(url = source_url, "stale image revalidated by remote metadata");
              return self.touch(entry, CacheOutcome::Validated);
            }
          }
        }
      }
    }

    let fetched = match self.chain.fetch_bytes(source_url).await {
      Ok(fetched) => fetched,
      Err(e) => {
        warn!(url = source_url, error = %e, "image fetch failed, keeping cached copy");
        return CacheOutcome::FetchFailed;
      }
    };

    if fetched.bytes.is_empty() {
      warn!(url = source_url, "image fetch returned an empty body");
      return CacheOutcome::FetchFailed;
    }

    let blob_hash = sha256_hex(&fetched.bytes);

    if !force {
      if let Some(entry) = &existing {
        if entry.key == key && entry.blob_hash == blob_hash {
          debug!(url = source_url, "image content unchanged, skipping blob write");
          return self.touch(entry, CacheOutcome::Unchanged);
        }
      }
    }

    let image = CachedImage {
      partition,
      key,
      source_url: source_url.to_string(),
      blob: fetched.bytes,
      blob_hash,
      etag: fetched.etag,
      updated_at: now,
    };

    match self.store.put_image(&image) {
      Ok(()) => {
        debug!(url = source_url, %partition, bytes = image.blob.len(), "image cached");
        CacheOutcome::Stored
      }
      Err(e) => {
        warn!(url = source_url, error = %e, "failed to store image");
        CacheOutcome::StorageFailed
      }
    }
  }

  /// Entry by key, falling back to a lookup by source URL.
  fn lookup(
    &self,
    partition: Partition,
    key: &str,
    source_url: &str,
  ) -> Result<Option<CachedImage>, StoreError> {
    match self.store.get_image(partition, key)? {
      Some(image) => Ok(Some(image)),
      None => self.store.find_image_by_source(partition, source_url),
    }
  }

  fn touch(&self, entry: &CachedImage, outcome: CacheOutcome) -> CacheOutcome {
    match self
      .store
      .touch_image(entry.partition, &entry.key, self.clock.now())
    {
      Ok(_) => outcome,
      Err(e) => {
        warn!(url = %entry.source_url, error = %e, "failed to refresh image timestamp");
        CacheOutcome::StorageFailed
      }
    }
  }

  /// Display source for an image, without touching the network.
  ///
  /// Cached blobs get a fresh object URL that the caller must revoke when
  /// done; anything else resolves to the (proxied) remote URL.
  pub fn resolve(&self, source_url: &str, partition: Partition) -> DisplaySource {
    let key = cache_key(source_url);

    match self.lookup(partition, &key, source_url) {
      Ok(Some(image)) => DisplaySource::Local {
        object_url: self.object_urls.create(partition, &image.key, image.blob),
      },
      Ok(None) => self.remote_source(source_url),
      Err(e) => {
        warn!(url = source_url, error = %e, "image cache unavailable, using remote url");
        self.remote_source(source_url)
      }
    }
  }

  fn remote_source(&self, source_url: &str) -> DisplaySource {
    let url = match &self.proxy {
      Some(proxy) => proxied_url(proxy, source_url).into(),
      None => source_url.to_string(),
    };
    DisplaySource::Remote { url }
  }

  /// Delete entries older than the sweep TTL in every partition.
  pub fn sweep(&self) -> Result<usize, StoreError> {
    let cutoff = self.clock.now() - self.ttls.sweep;
    let removed = self.store.sweep_images(cutoff)?;
    info!(removed, "image cache sweep finished");
    Ok(removed)
  }
}

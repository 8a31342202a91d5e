//! Image blob caching.
//!
//! - blobs are keyed by sha256 of the canonical source URL, per partition
//! - entries are revalidated by TTL, remote validators, then content hash
//! - downloads go through an ordered fallback chain (direct, then proxy)
//! - concurrent requests for one URL share a single download

mod cache;
mod fetch;
mod key;
mod object_url;
mod prefetch;
mod types;

pub use cache::{CacheOutcome, CacheTtls, ImageCache};
pub use fetch::{
  proxied_url, DirectFetch, FallbackChain, HttpMetadataProbe, ImageResolver, MetadataProbe,
  ProxyFetch,
};
pub use key::{cache_key, canonicalize, sha256_hex};
pub use object_url::ObjectUrlRegistry;
pub use prefetch::{spawn_prefetcher, ImageJob, ImageQueue};
pub use types::{CachedImage, DisplaySource, FetchedImage, Partition, RemoteMetadata};

//! Image download strategies and the fallback chain that tries them in order.

use async_trait::async_trait;
use reqwest::header::ETAG;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::types::{FetchedImage, RemoteMetadata};
use crate::error::{FetchError, ImageFetchFailed};

/// One way of turning an image URL into bytes.
#[async_trait]
pub trait ImageResolver: Send + Sync {
  /// Short name used in logs and failure reports
  fn name(&self) -> &'static str;

  async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError>;
}

/// Build the same-origin proxy URL for a remote image.
pub fn proxied_url(proxy: &Url, source_url: &str) -> Url {
  let mut url = proxy.clone();
  url.query_pairs_mut().append_pair("url", source_url);
  url
}

async fn get_image(client: &reqwest::Client, url: &str) -> Result<FetchedImage, FetchError> {
  let response = client
    .get(url)
    .send()
    .await
    .map_err(|e| FetchError::Network(e.to_string()))?;

  let status = response.status();
  if !status.is_success() {
    return Err(FetchError::Status(status.as_u16()));
  }

  let etag = response
    .headers()
    .get(ETAG)
    .and_then(|v| v.to_str().ok())
    .map(String::from);

  let bytes = response
    .bytes()
    .await
    .map_err(|e| FetchError::Network(e.to_string()))?;

  Ok(FetchedImage {
    bytes: bytes.to_vec(),
    etag,
  })
}

/// Fetch straight from the origin server.
pub struct DirectFetch {
  client: reqwest::Client,
  block_mixed_content: bool,
}

impl DirectFetch {
  pub fn new(client: reqwest::Client, block_mixed_content: bool) -> Self {
    Self {
      client,
      block_mixed_content,
    }
  }
}

#[async_trait]
impl ImageResolver for DirectFetch {
  fn name(&self) -> &'static str {
    "direct"
  }

  async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
    if self.block_mixed_content && is_plain_http(url) {
      return Err(FetchError::MixedContent);
    }
    get_image(&self.client, url).await
  }
}

/// Fetch through a same-origin proxy that re-fetches server-side.
pub struct ProxyFetch {
  client: reqwest::Client,
  endpoint: Url,
}

impl ProxyFetch {
  pub fn new(client: reqwest::Client, endpoint: Url) -> Self {
    Self { client, endpoint }
  }
}

#[async_trait]
impl ImageResolver for ProxyFetch {
  fn name(&self) -> &'static str {
    "proxy"
  }

  async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
    let target = proxied_url(&self.endpoint, url);
    get_image(&self.client, target.as_str()).await
  }
}

/// Ordered list of resolvers; the first success wins.
#[derive(Clone, Default)]
pub struct FallbackChain {
  resolvers: Vec<Arc<dyn ImageResolver>>,
}

impl FallbackChain {
  pub fn new(resolvers: Vec<Arc<dyn ImageResolver>>) -> Self {
    Self { resolvers }
  }

  /// Direct fetch, then the proxy when one is configured.
  pub fn direct_then_proxy(
    client: reqwest::Client,
    proxy: Option<Url>,
    block_mixed_content: bool,
  ) -> Self {
    let mut resolvers: Vec<Arc<dyn ImageResolver>> =
      vec![Arc::new(DirectFetch::new(client.clone(), block_mixed_content))];
    if let Some(endpoint) = proxy {
      resolvers.push(Arc::new(ProxyFetch::new(client, endpoint)));
    }
    Self { resolvers }
  }

  pub fn len(&self) -> usize {
    self.resolvers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.resolvers.is_empty()
  }

  pub async fn fetch_bytes(&self, url: &str) -> Result<FetchedImage, ImageFetchFailed> {
    let mut attempts = Vec::with_capacity(self.resolvers.len());

    for resolver in &self.resolvers {
      match resolver.fetch(url).await {
        Ok(image) if image.bytes.is_empty() => {
          debug!(resolver = resolver.name(), url, "empty image body");
          attempts.push(format!("{}: {}", resolver.name(), FetchError::EmptyBody));
        }
        Ok(image) => {
          debug!(resolver = resolver.name(), url, bytes = image.bytes.len(), "image fetched");
          return Ok(image);
        }
        Err(e) => {
          debug!(resolver = resolver.name(), url, error = %e, "image resolver failed");
          attempts.push(format!("{}: {}", resolver.name(), e));
        }
      }
    }

    Err(ImageFetchFailed { attempts })
  }
}

/// Cheap remote validation of an image without downloading its body.
#[async_trait]
pub trait MetadataProbe: Send + Sync {
  /// `None` when no validators could be obtained.
  async fn probe(&self, url: &str) -> Option<RemoteMetadata>;
}

/// Reads validators from a metadata endpoint, or from a HEAD request's ETag.
pub struct HttpMetadataProbe {
  client: reqwest::Client,
  endpoint: Option<Url>,
}

impl HttpMetadataProbe {
  pub fn new(client: reqwest::Client, endpoint: Option<Url>) -> Self {
    Self { client, endpoint }
  }

  async fn from_endpoint(&self, endpoint: &Url, url: &str) -> Option<RemoteMetadata> {
    let target = proxied_url(endpoint, url);
    let response = self.client.get(target).send().await.ok()?;
    if !response.status().is_success() {
      return None;
    }
    response.json::<RemoteMetadata>().await.ok()
  }

  async fn from_head(&self, url: &str) -> Option<RemoteMetadata> {
    let response = self.client.head(url).send().await.ok()?;
    if !response.status().is_success() {
      return None;
    }
    let etag = response
      .headers()
      .get(ETAG)
      .and_then(|v| v.to_str().ok())
      .map(String::from)?;
    Some(RemoteMetadata {
      hash: None,
      etag: Some(etag),
    })
  }
}

#[async_trait]
impl MetadataProbe for HttpMetadataProbe {
  async fn probe(&self, url: &str) -> Option<RemoteMetadata> {
    let metadata = match &self.endpoint {
      Some(endpoint) => self.from_endpoint(endpoint, url).await,
      None => self.from_head(url).await,
    };
    metadata.filter(|m| m.hash.is_some() || m.etag.is_some())
  }
}

/// Scheme check that matches `HTTP://` as well as `http://`.
fn is_plain_http(url: &str) -> bool {
  Url::parse(url.trim()).is_ok_and(|u| u.scheme() == "http")
}

//! Wires configuration into the store, image cache and controllers.

use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::controller::{ControllerEvent, OfflineFirstController, ViewStatus};
use crate::error::StoreError;
use crate::image::{
  spawn_prefetcher, CacheOutcome, DisplaySource, FallbackChain, HttpMetadataProbe, ImageCache,
  ImageQueue, Partition,
};
use crate::network::{spawn_reachability_check, HttpReachability, NetworkMonitor};
use crate::records::Domain;
use crate::remote::{HttpRemoteSource, RemoteSource};
use crate::store::{ContentStore, ImageStore, SqliteStorage, UnavailableStorage};
use crate::sync::RecordSynchronizer;

/// Process-wide singletons shared by every domain controller.
pub struct App {
  config: Config,
  content: Arc<dyn ContentStore>,
  image_store: Arc<dyn ImageStore>,
  images: Arc<ImageCache>,
  remote: Arc<dyn RemoteSource>,
  network: Arc<NetworkMonitor>,
  clock: Arc<dyn Clock>,
  queue: ImageQueue,
  prefetcher: JoinHandle<usize>,
  reachability: Option<JoinHandle<()>>,
}

impl App {
  /// Build the application. Must be called inside a tokio runtime.
  pub fn new(config: Config) -> Result<Self> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (content, image_store) = open_storage(config.database_path().as_deref());

    let client = HttpRemoteSource::client_with_timeout(config.sync.request_timeout())
      .map_err(|e| eyre!("Failed to create http client: {}", e))?;

    let chain = FallbackChain::direct_then_proxy(
      client.clone(),
      config.images.proxy_url.clone(),
      config.images.block_mixed_content,
    );
    let probe = Arc::new(HttpMetadataProbe::new(
      client.clone(),
      config.images.metadata_url.clone(),
    ));
    let images = Arc::new(
      ImageCache::new(Arc::clone(&image_store), chain, Arc::clone(&clock))
        .with_probe(probe)
        .with_proxy(config.images.proxy_url.clone())
        .with_ttls(config.cache.ttls()),
    );

    let (queue, rx) = ImageQueue::channel();
    let prefetcher = spawn_prefetcher(Arc::clone(&images), rx);

    let network = Arc::new(NetworkMonitor::new(true));
    network.set_metered(config.metered());

    // Once a sync finds the remote unreachable, poll the first source until it answers
    let reachability = Domain::ALL
      .into_iter()
      .find_map(|d| config.sources.get(&d).cloned())
      .map(|target| {
        spawn_reachability_check(
          Arc::clone(&network),
          Arc::new(HttpReachability::new(client.clone(), target)),
          config.sync.settings().retry_interval,
        )
      });

    let remote: Arc<dyn RemoteSource> =
      Arc::new(HttpRemoteSource::new(client, config.sources.clone()));

    Ok(Self {
      config,
      content,
      image_store,
      images,
      remote,
      network,
      clock,
      queue,
      prefetcher,
      reachability,
    })
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn network(&self) -> &Arc<NetworkMonitor> {
    &self.network
  }

  /// Domains that have a configured remote source.
  pub fn configured_domains(&self) -> Vec<Domain> {
    Domain::ALL
      .into_iter()
      .filter(|d| self.config.sources.contains_key(d))
      .collect()
  }

  pub fn controller(
    &self,
    domain: Domain,
  ) -> (OfflineFirstController, mpsc::UnboundedReceiver<ControllerEvent>) {
    let synchronizer =
      RecordSynchronizer::new(Arc::clone(&self.content)).with_image_queue(self.queue.clone());

    OfflineFirstController::new(
      domain,
      synchronizer,
      Arc::clone(&self.remote),
      self.network.clone(),
      Arc::clone(&self.clock),
      self.config.sync.settings(),
    )
  }

  /// Load local data and run one remote sync for `domain`.
  pub async fn sync_once(&self, domain: Domain) -> ViewStatus {
    let (mut controller, _events) = self.controller(domain);
    let local = controller.load_local();
    info!(%domain, records = local.records.len(), phase = ?local.phase, "local data loaded");
    controller.sync_remote().await.clone()
  }

  pub fn count(&self, domain: Domain) -> Result<usize, StoreError> {
    self.content.count(domain)
  }

  pub fn image_count(&self, partition: Partition) -> Result<usize, StoreError> {
    self.image_store.image_count(partition)
  }

  /// Cache one image now; `force` rewrites it even when fresh.
  pub async fn fetch_image(&self, url: &str, partition: Partition, force: bool) -> CacheOutcome {
    self.images.ensure_cached_with(url, partition, force).await
  }

  pub fn sweep(&self) -> Result<usize, StoreError> {
    self.images.sweep()
  }

  pub fn resolve(&self, url: &str, partition: Partition) -> DisplaySource {
    self.images.resolve(url, partition)
  }

  /// Close the image queue and wait for outstanding downloads.
  pub async fn shutdown(self) -> usize {
    if let Some(task) = &self.reachability {
      task.abort();
    }
    drop(self.queue);
    match self.prefetcher.await {
      Ok(processed) => processed,
      Err(e) => {
        warn!(error = %e, "image prefetcher task failed");
        0
      }
    }
  }
}

/// Open the database, degrading to network-only storage on failure.
fn open_storage(path: Option<&Path>) -> (Arc<dyn ContentStore>, Arc<dyn ImageStore>) {
  let opened = match path {
    Some(p) => SqliteStorage::open(p),
    None => Err(StoreError::StorageUnavailable(
      "could not determine a data directory".to_string(),
    )),
  };

  match opened {
    Ok(storage) => {
      let storage = Arc::new(storage);
      let content: Arc<dyn ContentStore> = storage.clone();
      let images: Arc<dyn ImageStore> = storage;
      (content, images)
    }
    Err(e) => {
      warn!(error = %e, "local storage unavailable, continuing without offline cache");
      let unavailable = Arc::new(UnavailableStorage::new(e.to_string()));
      let content: Arc<dyn ContentStore> = unavailable.clone();
      let images: Arc<dyn ImageStore> = unavailable;
      (content, images)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::network::NetworkStatus;
  use url::Url;

  #[tokio::test]
  async fn test_app_uses_configured_database() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
      database: Some(dir.path().join("larder.db")),
      ..Default::default()
    };

    let app = App::new(config).unwrap();
    assert_eq!(app.count(Domain::Products).unwrap(), 0);
    assert!(app.configured_domains().is_empty());
    assert_eq!(app.shutdown().await, 0);
  }

  #[tokio::test]
  async fn test_unconfigured_domain_sync_fails_softly() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
      database: Some(dir.path().join("larder.db")),
      ..Default::default()
    };
    let app = App::new(config).unwrap();

    let status = app.sync_once(Domain::News).await;
    assert_eq!(status.phase, crate::controller::Phase::SyncFailed);
    assert!(status.error_message.is_some());
    // A missing source says nothing about connectivity
    assert!(app.network().is_online());
  }

  #[tokio::test]
  async fn test_metered_config_reaches_controllers() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config {
      database: Some(dir.path().join("larder.db")),
      ..Default::default()
    };
    config.sync.metered = true;
    config
      .sources
      .insert(Domain::News, Url::parse("http://127.0.0.1:9/news").unwrap());

    let app = App::new(config).unwrap();
    assert!(app.network().is_metered());
    assert!(app.reachability.is_some());

    let (mut controller, mut events) = app.controller(Domain::News);
    controller.load_local();
    let status = controller.sync_remote().await;
    assert_eq!(status.phase, crate::controller::Phase::LocalEmpty);
    assert!(status.error_message.is_none());

    let mut skipped = false;
    while let Ok(event) = events.try_recv() {
      skipped |= event
        == ControllerEvent::Skipped {
          reason: crate::controller::SkipReason::Metered,
        };
    }
    assert!(skipped);
    assert!(app.network().is_online());
    drop(controller);
    assert_eq!(app.shutdown().await, 0);
  }

  #[tokio::test]
  async fn test_fetch_image_reports_failure_for_unreachable_host() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
      database: Some(dir.path().join("larder.db")),
      ..Default::default()
    };
    let app = App::new(config).unwrap();

    let outcome = app
      .fetch_image("http://127.0.0.1:9/a.png", Partition::Generic, true)
      .await;
    assert_eq!(outcome, CacheOutcome::FetchFailed);
    assert_eq!(app.image_count(Partition::Generic).unwrap(), 0);
  }

  #[test]
  fn test_unopenable_storage_degrades() {
    let (content, images) = open_storage(None);
    assert!(matches!(
      content.count(Domain::Products),
      Err(StoreError::StorageUnavailable(_))
    ));
    assert!(images.image_count(Partition::Product).is_err());
  }
}

//! Connectivity and metered-network status.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use url::Url;

/// Snapshot of the connection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Connectivity {
  pub online: bool,
  /// Offline→online transitions seen so far. A watcher that only sees the
  /// latest value can still tell it missed a reconnect.
  pub reconnects: u64,
}

pub trait NetworkStatus: Send + Sync {
  fn connectivity(&self) -> Connectivity;

  /// Whether the current connection is billed by usage.
  fn is_metered(&self) -> bool;

  fn is_online(&self) -> bool {
    self.connectivity().online
  }

  /// Outcome of the last attempt to reach a remote.
  fn report_reachable(&self, _reachable: bool) {}
}

/// Shared, settable network status that broadcasts connectivity changes.
#[derive(Debug)]
pub struct NetworkMonitor {
  state: watch::Sender<Connectivity>,
  metered: AtomicBool,
}

impl NetworkMonitor {
  pub fn new(online: bool) -> Self {
    let (tx, _rx) = watch::channel(Connectivity {
      online,
      reconnects: 0,
    });
    Self {
      state: tx,
      metered: AtomicBool::new(false),
    }
  }

  /// Receiver that sees every connectivity change.
  pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
    self.state.subscribe()
  }

  pub fn set_online(&self, online: bool) {
    let changed = self.state.send_if_modified(|current| {
      if current.online == online {
        return false;
      }
      current.online = online;
      if online {
        current.reconnects += 1;
      }
      true
    });
    if changed {
      info!(online, "connectivity changed");
    }
  }

  pub fn set_metered(&self, metered: bool) {
    self.metered.store(metered, Ordering::Relaxed);
  }
}

impl NetworkStatus for NetworkMonitor {
  fn connectivity(&self) -> Connectivity {
    *self.state.borrow()
  }

  fn is_metered(&self) -> bool {
    self.metered.load(Ordering::Relaxed)
  }

  fn report_reachable(&self, reachable: bool) {
    self.set_online(reachable);
  }
}

/// Cheap test of whether the remote side can be reached at all.
#[async_trait]
pub trait ReachabilityCheck: Send + Sync {
  async fn reachable(&self) -> bool;
}

/// Any HTTP response from `target`, whatever its status, counts as reachable.
pub struct HttpReachability {
  client: reqwest::Client,
  target: Url,
}

impl HttpReachability {
  pub fn new(client: reqwest::Client, target: Url) -> Self {
    Self { client, target }
  }
}

#[async_trait]
impl ReachabilityCheck for HttpReachability {
  async fn reachable(&self) -> bool {
    self.client.head(self.target.clone()).send().await.is_ok()
  }
}

/// While `monitor` is offline, run `check` every `interval` and flip the
/// monitor back online once it passes. Runs until aborted.
pub fn spawn_reachability_check(
  monitor: Arc<NetworkMonitor>,
  check: Arc<dyn ReachabilityCheck>,
  interval: Duration,
) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      ticker.tick().await;
      if monitor.is_online() {
        continue;
      }
      if check.reachable().await {
        debug!("remote reachable again");
        monitor.set_online(true);
      }
    }
  })
}

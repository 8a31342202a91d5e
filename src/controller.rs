//! Offline-first orchestration for one domain.
//!
//! The controller shows local data straight away, then reconciles with the
//! remote source in the background:
//!
//! ```text
//! Idle → LoadingLocal → LocalReady | LocalEmpty | MustConnect
//!      → SyncingRemote → SyncedNoChange | SyncedChanged | SyncFailed
//! ```
//!
//! Failures never escape; they become fields on [`ViewStatus`].

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::SyncError;
use crate::network::{Connectivity, NetworkStatus};
use crate::records::{Domain, Record};
use crate::remote::RemoteSource;
use crate::sync::RecordSynchronizer;

/// Sync gating and retry behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
  /// How often a failed sync is retried and a successful one refreshed
  pub retry_interval: Duration,
  /// Allow syncing over a metered connection
  pub allow_metered: bool,
}

impl Default for SyncSettings {
  fn default() -> Self {
    Self {
      retry_interval: Duration::from_secs(60),
      allow_metered: false,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
  #[default]
  Idle,
  LoadingLocal,
  LocalReady,
  LocalEmpty,
  /// Nothing local and offline; the user has to connect once
  MustConnect,
  SyncingRemote,
  SyncedNoChange,
  SyncedChanged,
  SyncFailed,
}

/// What the presentation layer needs to render a domain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewStatus {
  pub phase: Phase,
  pub records: Vec<Record>,
  /// Records shown come from the local store and are not yet confirmed
  pub using_cache: bool,
  pub error_message: Option<String>,
  /// The last sync changed what is shown
  pub just_updated: bool,
}

/// Per-controller sync bookkeeping, re-derived at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
  pub last_sync_at: Option<DateTime<Utc>>,
  pub offline: bool,
  pub storage_available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
  Offline,
  Metered,
}

/// Notifications for whoever renders the domain.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
  LocalLoaded { count: usize },
  MustConnect,
  Updated { records: Vec<Record> },
  Unchanged,
  SyncFailed { message: String },
  Skipped { reason: SkipReason },
}

pub struct OfflineFirstController {
  domain: Domain,
  synchronizer: RecordSynchronizer,
  remote: Arc<dyn RemoteSource>,
  network: Arc<dyn NetworkStatus>,
  clock: Arc<dyn Clock>,
  settings: SyncSettings,
  state: SyncState,
  status: ViewStatus,
  /// Reconnect count as of the last sync attempt
  seen_reconnects: u64,
  events: mpsc::UnboundedSender<ControllerEvent>,
}

impl OfflineFirstController {
  pub fn new(
    domain: Domain,
    synchronizer: RecordSynchronizer,
    remote: Arc<dyn RemoteSource>,
    network: Arc<dyn NetworkStatus>,
    clock: Arc<dyn Clock>,
    settings: SyncSettings,
  ) -> (Self, mpsc::UnboundedReceiver<ControllerEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let seen_reconnects = network.connectivity().reconnects;
    let controller = Self {
      domain,
      synchronizer,
      remote,
      network,
      clock,
      settings,
      state: SyncState {
        storage_available: true,
        ..Default::default()
      },
      status: ViewStatus::default(),
      seen_reconnects,
      events: tx,
    };
    (controller, rx)
  }

  pub fn domain(&self) -> Domain {
    self.domain
  }

  pub fn status(&self) -> &ViewStatus {
    &self.status
  }

  pub fn sync_state(&self) -> &SyncState {
    &self.state
  }

  fn emit(&self, event: ControllerEvent) {
    // Nobody listening is fine
    let _ = self.events.send(event);
  }

  /// Read the local store. Never waits on the network.
  pub fn load_local(&mut self) -> &ViewStatus {
    self.status.phase = Phase::LoadingLocal;

    match self.synchronizer.store().get_all(self.domain) {
      Ok(records) if !records.is_empty() => {
        self.state.storage_available = true;
        let count = records.len();
        self.status.records = records;
        self.status.using_cache = true;
        self.status.phase = Phase::LocalReady;
        debug!(domain = %self.domain, count, "local records loaded");
        self.emit(ControllerEvent::LocalLoaded { count });
      }
      Ok(_) => {
        self.state.storage_available = true;
        self.show_empty_local();
      }
      Err(e) => {
        warn!(domain = %self.domain, error = %e, "local store unavailable, running network-only");
        self.state.storage_available = false;
        self.show_empty_local();
      }
    }

    &self.status
  }

  fn show_empty_local(&mut self) {
    self.status.records.clear();
    self.status.using_cache = false;

    if self.network.is_online() {
      self.status.phase = Phase::LocalEmpty;
    } else {
      self.state.offline = true;
      self.status.phase = Phase::MustConnect;
      self.emit(ControllerEvent::MustConnect);
    }
  }

  /// Fetch the remote snapshot and reconcile it into the store.
  pub async fn sync_remote(&mut self) -> &ViewStatus {
    let connectivity = self.network.connectivity();
    self.seen_reconnects = connectivity.reconnects;

    if !connectivity.online {
      self.state.offline = true;
      if self.status.records.is_empty() {
        self.status.phase = Phase::MustConnect;
        self.emit(ControllerEvent::MustConnect);
      } else {
        self.emit(ControllerEvent::Skipped {
          reason: SkipReason::Offline,
        });
      }
      return &self.status;
    }

    if self.network.is_metered() && !self.settings.allow_metered {
      info!(domain = %self.domain, "metered connection, sync skipped");
      self.emit(ControllerEvent::Skipped {
        reason: SkipReason::Metered,
      });
      return &self.status;
    }

    self.status.phase = Phase::SyncingRemote;
    self.status.just_updated = false;

    match self.remote.fetch_records(self.domain).await {
      Ok(fresh) => {
        self.network.report_reachable(true);
        self.apply_snapshot(fresh);
      }
      Err(e) => self.record_failure(e),
    }

    &self.status
  }

  fn apply_snapshot(&mut self, fresh: Vec<Record>) {
    self.state.offline = false;
    self.state.last_sync_at = Some(self.clock.now());
    self.status.error_message = None;

    if !self.state.storage_available {
      self.show_remote_only(fresh);
      return;
    }

    let outcome = match self.synchronizer.reconcile(self.domain, &fresh) {
      Ok(outcome) => outcome,
      Err(e) => {
        warn!(domain = %self.domain, error = %e, "failed to persist snapshot, showing remote data");
        self.state.storage_available = false;
        self.show_remote_only(fresh);
        return;
      }
    };

    if outcome.changed {
      self.status.records = match self.synchronizer.store().get_all(self.domain) {
        Ok(records) => records,
        Err(e) => {
          warn!(domain = %self.domain, error = %e, "failed to re-read store after sync");
          fresh
        }
      };
      self.status.using_cache = false;
      self.status.just_updated = true;
      self.status.phase = Phase::SyncedChanged;
      self.emit(ControllerEvent::Updated {
        records: self.status.records.clone(),
      });
      return;
    }

    if outcome.skipped_empty {
      warn!(domain = %self.domain, "remote returned no records, keeping local data");
    } else {
      self.status.using_cache = false;
      if self.status.records.is_empty() {
        // Store already matched but nothing was shown yet
        self.status.records = fresh;
      }
    }
    self.status.phase = Phase::SyncedNoChange;
    self.emit(ControllerEvent::Unchanged);
  }

  fn show_remote_only(&mut self, fresh: Vec<Record>) {
    let changed = self.status.records != fresh;
    self.status.records = fresh;
    self.status.using_cache = false;

    if changed {
      self.status.just_updated = true;
      self.status.phase = Phase::SyncedChanged;
      self.emit(ControllerEvent::Updated {
        records: self.status.records.clone(),
      });
    } else {
      self.status.phase = Phase::SyncedNoChange;
      self.emit(ControllerEvent::Unchanged);
    }
  }

  fn record_failure(&mut self, error: SyncError) {
    if matches!(error, SyncError::RemoteUnreachable(_)) {
      self.state.offline = true;
      self.network.report_reachable(false);
    }

    let message = if self.status.records.is_empty() {
      format!("no data available yet, connect to load: {}", error)
    } else {
      format!("showing saved data, update failed: {}", error)
    };
    warn!(domain = %self.domain, error = %error, "remote sync failed");

    self.status.phase = Phase::SyncFailed;
    self.status.error_message = Some(message.clone());
    self.emit(ControllerEvent::SyncFailed { message });
  }

  /// Never synced, last attempt failed, or the last sync is a full
  /// interval old.
  fn needs_sync(&self) -> bool {
    let interval = chrono::Duration::from_std(self.settings.retry_interval)
      .unwrap_or(chrono::Duration::MAX);

    match self.state.last_sync_at {
      None => true,
      Some(_) if matches!(self.status.phase, Phase::SyncFailed | Phase::MustConnect) => true,
      Some(at) => self.clock.now() - at >= interval,
    }
  }

  fn missed_reconnect(&self, connectivity: Connectivity) -> bool {
    connectivity.online && connectivity.reconnects != self.seen_reconnects
  }

  /// Keep the domain in sync until `shutdown` resolves.
  ///
  /// Any reconnect since the last attempt triggers a sync, including ones
  /// that happened before the loop started or during a sync. While online,
  /// the retry interval also retries failures and refreshes stale data.
  pub async fn run<F>(&mut self, mut connectivity: watch::Receiver<Connectivity>, shutdown: F)
  where
    F: Future<Output = ()>,
  {
    tokio::pin!(shutdown);

    let mut ticker = tokio::time::interval(self.settings.retry_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    let current = *connectivity.borrow_and_update();
    if self.missed_reconnect(current) {
      info!(domain = %self.domain, "reconnected before start, syncing");
      self.sync_remote().await;
    }

    loop {
      tokio::select! {
        _ = &mut shutdown => break,
        changed = connectivity.changed() => {
          if changed.is_err() {
            break;
          }
          let current = *connectivity.borrow_and_update();
          if self.missed_reconnect(current) {
            info!(domain = %self.domain, "back online, syncing");
            self.sync_remote().await;
          }
        }
        _ = ticker.tick() => {
          if self.network.is_online() && self.needs_sync() {
            debug!(domain = %self.domain, phase = ?self.status.phase, "periodic sync");
            self.sync_remote().await;
          }
        }
      }
    }

    debug!(domain = %self.domain, "controller stopped");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::ManualClock;
  use crate::network::NetworkMonitor;
  use crate::store::{ContentStore, SqliteStorage, UnavailableStorage};
  use async_trait::async_trait;
  use chrono::TimeDelta;
  use std::collections::VecDeque;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;

  /// Remote that replays canned responses; the last one repeats.
  struct ScriptedRemote {
    responses: Mutex<VecDeque<Result<Vec<Record>, String>>>,
    calls: AtomicUsize,
  }

  impl ScriptedRemote {
    fn new(responses: Vec<Result<Vec<Record>, String>>) -> Arc<Self> {
      Arc::new(Self {
        responses: Mutex::new(responses.into()),
        calls: AtomicUsize::new(0),
      })
    }

    fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }
  }

  #[async_trait]
  impl RemoteSource for ScriptedRemote {
    async fn fetch_records(&self, _domain: Domain) -> Result<Vec<Record>, SyncError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      let mut responses = self.responses.lock().unwrap();
      let next = if responses.len() > 1 {
        responses.pop_front()
      } else {
        responses.front().cloned()
      };
      match next {
        Some(Ok(records)) => Ok(records),
        Some(Err(message)) => Err(SyncError::RemoteUnreachable(message)),
        None => Err(SyncError::RemoteUnreachable("no script".into())),
      }
    }
  }

  fn product(id: i64, name: &str) -> Record {
    Record::new(id).with("name", name)
  }

  struct Fixture {
    controller: OfflineFirstController,
    events: mpsc::UnboundedReceiver<ControllerEvent>,
    remote: Arc<ScriptedRemote>,
    network: Arc<NetworkMonitor>,
  }

  /// Wall time that follows tokio's clock, so paused tests can move it.
  struct TokioClock {
    base: DateTime<Utc>,
    origin: tokio::time::Instant,
  }

  impl TokioClock {
    fn new() -> Self {
      Self {
        base: Utc::now(),
        origin: tokio::time::Instant::now(),
      }
    }
  }

  impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
      self.base + TimeDelta::from_std(self.origin.elapsed()).unwrap()
    }
  }

  fn fixture_with(
    store: Arc<dyn ContentStore>,
    responses: Vec<Result<Vec<Record>, String>>,
    online: bool,
    settings: SyncSettings,
  ) -> Fixture {
    fixture_with_clock(
      store,
      responses,
      online,
      settings,
      Arc::new(ManualClock::new(Utc::now())),
    )
  }

  fn fixture_with_clock(
    store: Arc<dyn ContentStore>,
    responses: Vec<Result<Vec<Record>, String>>,
    online: bool,
    settings: SyncSettings,
    clock: Arc<dyn Clock>,
  ) -> Fixture {
    let remote = ScriptedRemote::new(responses);
    let network = Arc::new(NetworkMonitor::new(online));
    let (controller, events) = OfflineFirstController::new(
      Domain::Products,
      RecordSynchronizer::new(store),
      remote.clone(),
      network.clone(),
      clock,
      settings,
    );
    Fixture {
      controller,
      events,
      remote,
      network,
    }
  }

  fn fixture(seed: &[Record], responses: Vec<Result<Vec<Record>, String>>, online: bool) -> Fixture {
    let store = Arc::new(SqliteStorage::open_in_memory().unwrap());
    for record in seed {
      store.put(Domain::Products, record).unwrap();
    }
    fixture_with(store, responses, online, SyncSettings::default())
  }

  fn drain(events: &mut mpsc::UnboundedReceiver<ControllerEvent>) -> Vec<ControllerEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
      out.push(event);
    }
    out
  }

  #[tokio::test]
  async fn test_local_first_then_remote_update() {
    let mut f = fixture(
      &[product(1, "Old")],
      vec![Ok(vec![product(1, "New")])],
      true,
    );

    let local = f.controller.load_local().clone();
    assert_eq!(local.phase, Phase::LocalReady);
    assert!(local.using_cache);
    assert_eq!(local.records[0].attr_str("name"), Some("Old"));
    assert_eq!(f.remote.calls(), 0);

    let synced = f.controller.sync_remote().await.clone();
    assert_eq!(synced.phase, Phase::SyncedChanged);
    assert!(synced.just_updated);
    assert!(!synced.using_cache);
    assert_eq!(synced.records[0].attr_str("name"), Some("New"));

    let events = drain(&mut f.events);
    let updates = events
      .iter()
      .filter(|e| matches!(e, ControllerEvent::Updated { .. }))
      .count();
    assert_eq!(updates, 1);
    assert_eq!(events[0], ControllerEvent::LocalLoaded { count: 1 });
  }

  #[tokio::test]
  async fn test_unchanged_remote_reports_no_change() {
    let mut f = fixture(&[product(1, "Same")], vec![Ok(vec![product(1, "Same")])], true);
    f.controller.load_local();

    let status = f.controller.sync_remote().await;
    assert_eq!(status.phase, Phase::SyncedNoChange);
    assert!(!status.just_updated);
    assert!(drain(&mut f.events).contains(&ControllerEvent::Unchanged));
  }

  #[tokio::test]
  async fn test_empty_and_offline_must_connect() {
    let mut f = fixture(&[], vec![Ok(vec![product(1, "A")])], false);

    assert_eq!(f.controller.load_local().phase, Phase::MustConnect);
    assert_eq!(f.controller.sync_remote().await.phase, Phase::MustConnect);
    assert_eq!(f.remote.calls(), 0);
    assert!(f.controller.sync_state().offline);
  }

  #[tokio::test]
  async fn test_empty_local_online_fetches() {
    let mut f = fixture(&[], vec![Ok(vec![product(1, "A"), product(2, "B")])], true);

    assert_eq!(f.controller.load_local().phase, Phase::LocalEmpty);
    let status = f.controller.sync_remote().await;
    assert_eq!(status.phase, Phase::SyncedChanged);
    assert_eq!(status.records.len(), 2);
  }

  #[tokio::test]
  async fn test_failure_keeps_local_data() {
    let mut f = fixture(&[product(1, "Saved")], vec![Err("timeout".into())], true);
    f.controller.load_local();

    let status = f.controller.sync_remote().await.clone();
    assert_eq!(status.phase, Phase::SyncFailed);
    assert_eq!(status.records.len(), 1);
    assert!(status.using_cache);
    assert!(status.error_message.unwrap().contains("timeout"));
    assert!(f.controller.sync_state().offline);
  }

  #[tokio::test]
  async fn test_failure_without_local_data_is_error_state() {
    let mut f = fixture(&[], vec![Err("dns".into())], true);
    f.controller.load_local();

    let status = f.controller.sync_remote().await;
    assert_eq!(status.phase, Phase::SyncFailed);
    assert!(status.records.is_empty());
    assert!(status
      .error_message
      .as_deref()
      .unwrap()
      .starts_with("no data available yet"));
  }

  #[tokio::test]
  async fn test_empty_remote_keeps_local_data() {
    let mut f = fixture(&[product(1, "Keep")], vec![Ok(Vec::new())], true);
    f.controller.load_local();

    let status = f.controller.sync_remote().await;
    assert_eq!(status.phase, Phase::SyncedNoChange);
    assert_eq!(status.records.len(), 1);
    assert!(status.using_cache);
  }

  #[tokio::test]
  async fn test_metered_network_is_gated() {
    let mut f = fixture(&[product(1, "A")], vec![Ok(vec![product(1, "B")])], true);
    f.network.set_metered(true);
    f.controller.load_local();

    f.controller.sync_remote().await;
    assert_eq!(f.remote.calls(), 0);
    assert!(drain(&mut f.events).contains(&ControllerEvent::Skipped {
      reason: SkipReason::Metered
    }));

    let store = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let mut allowed = fixture_with(
      store,
      vec![Ok(vec![product(1, "B")])],
      true,
      SyncSettings {
        allow_metered: true,
        ..Default::default()
      },
    );
    allowed.network.set_metered(true);
    allowed.controller.sync_remote().await;
    assert_eq!(allowed.remote.calls(), 1);
  }

  #[tokio::test]
  async fn test_unavailable_storage_runs_network_only() {
    let mut f = fixture_with(
      Arc::new(UnavailableStorage::new("disabled")),
      vec![Ok(vec![product(1, "Live")])],
      true,
      SyncSettings::default(),
    );

    assert_eq!(f.controller.load_local().phase, Phase::LocalEmpty);
    assert!(!f.controller.sync_state().storage_available);

    let status = f.controller.sync_remote().await;
    assert_eq!(status.phase, Phase::SyncedChanged);
    assert_eq!(status.records[0].attr_str("name"), Some("Live"));
  }

  #[tokio::test]
  async fn test_coming_back_online_triggers_sync() {
    let f = fixture(&[], vec![Ok(vec![product(1, "Fresh")])], false);
    let Fixture {
      mut controller,
      mut events,
      remote,
      network,
    } = f;

    controller.load_local();
    assert_eq!(events.recv().await, Some(ControllerEvent::MustConnect));

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let online = network.subscribe();
    let worker = tokio::spawn(async move {
      controller
        .run(online, async {
          let _ = stop_rx.await;
        })
        .await;
      controller
    });

    network.set_online(true);
    let event = tokio::time::timeout(Duration::from_secs(2), async {
      loop {
        match events.recv().await {
          Some(ControllerEvent::Updated { records }) => break records,
          Some(_) => continue,
          None => panic!("controller dropped its sender"),
        }
      }
    })
    .await
    .unwrap();
    assert_eq!(event[0].attr_str("name"), Some("Fresh"));

    stop_tx.send(()).unwrap();
    let controller = worker.await.unwrap();
    assert_eq!(controller.status().phase, Phase::SyncedChanged);
    assert_eq!(remote.calls(), 1);
  }

  #[tokio::test]
  async fn test_unreachable_remote_takes_network_offline() {
    let mut f = fixture(
      &[product(1, "Saved")],
      vec![Err("timeout".into()), Ok(vec![product(1, "New")])],
      true,
    );
    f.controller.load_local();

    f.controller.sync_remote().await;
    assert!(!f.network.is_online());

    // Offline now, so no request goes out
    f.controller.sync_remote().await;
    assert_eq!(f.remote.calls(), 1);

    f.network.set_online(true);
    assert_eq!(f.controller.sync_remote().await.phase, Phase::SyncedChanged);
    assert!(f.network.is_online());
  }

  #[tokio::test(start_paused = true)]
  async fn test_successful_sync_is_refreshed_every_interval() {
    let Fixture {
      mut controller,
      remote,
      network,
      ..
    } = fixture_with_clock(
      Arc::new(SqliteStorage::open_in_memory().unwrap()),
      vec![Ok(vec![product(1, "A")])],
      true,
      SyncSettings::default(),
      Arc::new(TokioClock::new()),
    );

    controller.sync_remote().await;
    assert_eq!(remote.calls(), 1);

    controller
      .run(
        network.subscribe(),
        tokio::time::sleep(Duration::from_secs(601)),
      )
      .await;
    assert_eq!(remote.calls(), 11);
  }

  #[tokio::test(start_paused = true)]
  async fn test_offline_ticks_do_not_call_remote() {
    let Fixture {
      mut controller,
      remote,
      network,
      ..
    } = fixture_with_clock(
      Arc::new(SqliteStorage::open_in_memory().unwrap()),
      vec![Ok(vec![product(1, "A")])],
      false,
      SyncSettings::default(),
      Arc::new(TokioClock::new()),
    );

    controller.load_local();
    controller
      .run(
        network.subscribe(),
        tokio::time::sleep(Duration::from_secs(300)),
      )
      .await;
    assert_eq!(remote.calls(), 0);
    assert_eq!(controller.status().phase, Phase::MustConnect);
  }

  #[tokio::test]
  async fn test_flap_before_run_triggers_sync() {
    let Fixture {
      mut controller,
      remote,
      network,
      ..
    } = fixture(&[], vec![Ok(vec![product(1, "A")])], true);

    controller.sync_remote().await;
    network.set_online(false);
    network.set_online(true);

    controller
      .run(
        network.subscribe(),
        tokio::time::sleep(Duration::from_millis(50)),
      )
      .await;
    assert_eq!(remote.calls(), 2);
  }

  /// Drops and restores connectivity while its first request is in flight.
  struct FlappingRemote {
    network: Arc<NetworkMonitor>,
    calls: AtomicUsize,
  }

  #[async_trait]
  impl RemoteSource for FlappingRemote {
    async fn fetch_records(&self, _domain: Domain) -> Result<Vec<Record>, SyncError> {
      if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
        self.network.set_online(false);
        self.network.set_online(true);
      }
      Ok(vec![product(1, "A")])
    }
  }

  #[tokio::test]
  async fn test_flap_during_sync_triggers_another_sync() {
    let network = Arc::new(NetworkMonitor::new(false));
    let remote = Arc::new(FlappingRemote {
      network: network.clone(),
      calls: AtomicUsize::new(0),
    });
    let (mut controller, _events) = OfflineFirstController::new(
      Domain::News,
      RecordSynchronizer::new(Arc::new(SqliteStorage::open_in_memory().unwrap())),
      remote.clone(),
      network.clone(),
      Arc::new(ManualClock::new(Utc::now())),
      SyncSettings::default(),
    );

    let connectivity = network.subscribe();
    network.set_online(true);
    controller
      .run(connectivity, tokio::time::sleep(Duration::from_millis(50)))
      .await;

    assert_eq!(remote.calls.load(Ordering::SeqCst), 2);
  }
}

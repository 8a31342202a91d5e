//! Reconciles a fresh remote snapshot into the local content store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::image::{ImageJob, ImageQueue};
use crate::records::{Domain, Record};
use crate::store::{ContentStore, RecordDiff};

/// Summary of one reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
  pub changed: bool,
  pub inserted: usize,
  pub updated: usize,
  pub deleted: usize,
  /// The snapshot was empty and ignored
  pub skipped_empty: bool,
}

/// Computes and applies the minimal diff between the store and a snapshot.
#[derive(Clone)]
pub struct RecordSynchronizer {
  store: Arc<dyn ContentStore>,
  images: Option<ImageQueue>,
}

impl RecordSynchronizer {
  pub fn new(store: Arc<dyn ContentStore>) -> Self {
    Self {
      store,
      images: None,
    }
  }

  /// Enqueue image prefetch jobs for synced records.
  pub fn with_image_queue(mut self, queue: ImageQueue) -> Self {
    self.images = Some(queue);
    self
  }

  pub fn store(&self) -> &Arc<dyn ContentStore> {
    &self.store
  }

  /// Make the domain's store match `fresh`.
  ///
  /// An empty snapshot is treated as a suspect response and never prunes.
  /// Deletions and upserts are applied in one atomic step.
  pub fn reconcile(&self, domain: Domain, fresh: &[Record]) -> Result<ReconcileOutcome, StoreError> {
    if fresh.is_empty() {
      warn!(%domain, "empty remote snapshot, leaving local data untouched");
      return Ok(ReconcileOutcome {
        skipped_empty: true,
        ..Default::default()
      });
    }

    let existing: HashMap<String, Record> = self
      .store
      .get_all(domain)?
      .into_iter()
      .map(|r| (r.id.store_key(), r))
      .collect();

    let (diff, outcome) = compute_diff(&existing, fresh);

    if !diff.is_empty() {
      self.store.apply(domain, &diff)?;
    }

    if outcome.changed {
      info!(
        %domain,
        inserted = outcome.inserted,
        updated = outcome.updated,
        deleted = outcome.deleted,
        "local store reconciled"
      );
    } else {
      debug!(%domain, records = fresh.len(), "local store already up to date");
    }

    self.enqueue_images(domain, fresh);
    Ok(outcome)
  }

  /// Insert or overwrite a single record. Returns whether it changed.
  pub fn upsert_one(&self, domain: Domain, record: &Record) -> Result<bool, StoreError> {
    let current = self.store.get(domain, &record.id)?;
    if current.as_ref() == Some(record) {
      return Ok(false);
    }

    self.store.put(domain, record)?;
    self.enqueue_images(domain, std::slice::from_ref(record));
    Ok(true)
  }

  fn enqueue_images(&self, domain: Domain, records: &[Record]) {
    let (Some(queue), Some(partition)) = (&self.images, domain.image_partition()) else {
      return;
    };

    for url in records.iter().filter_map(|r| r.image_url.as_deref()) {
      if !queue.enqueue(ImageJob::new(url, partition)) {
        break;
      }
    }
  }
}

/// Deletions for ids missing from `fresh`, upserts for new or changed records.
fn compute_diff(existing: &HashMap<String, Record>, fresh: &[Record]) -> (RecordDiff, ReconcileOutcome) {
  let fresh_ids: HashSet<String> = fresh.iter().map(|r| r.id.store_key()).collect();

  let mut diff = RecordDiff::default();
  let mut outcome = ReconcileOutcome::default();

  for (key, record) in existing {
    if !fresh_ids.contains(key) {
      diff.deletes.push(record.id.clone());
    }
  }
  outcome.deleted = diff.deletes.len();

  for record in fresh {
    match existing.get(&record.id.store_key()) {
      None => {
        outcome.inserted += 1;
        diff.upserts.push(record.clone());
      }
      Some(current) if current == record => {}
      Some(_) => {
        outcome.updated += 1;
        diff.upserts.push(record.clone());
      }
    }
  }

  outcome.changed = outcome.inserted + outcome.updated + outcome.deleted > 0;
  (diff, outcome)
}

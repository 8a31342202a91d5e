//! Background image prefetching fed by a channel.
//!
//! The synchronizer only enqueues jobs; the worker turns each job into an
//! independent task so unrelated downloads interleave freely.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, trace};

use super::cache::ImageCache;
use super::types::Partition;

/// A request to cache one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageJob {
  pub source_url: String,
  pub partition: Partition,
}

impl ImageJob {
  pub fn new(source_url: impl Into<String>, partition: Partition) -> Self {
    Self {
      source_url: source_url.into(),
      partition,
    }
  }
}

/// Sending half of the prefetch queue.
#[derive(Debug, Clone)]
pub struct ImageQueue {
  tx: mpsc::UnboundedSender<ImageJob>,
}

impl ImageQueue {
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<ImageJob>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx }, rx)
  }

  /// Queue a job. Returns `false` when the worker has gone away.
  pub fn enqueue(&self, job: ImageJob) -> bool {
    match self.tx.send(job) {
      Ok(()) => true,
      Err(e) => {
        debug!(url = %e.0.source_url, "image queue closed, dropping job");
        false
      }
    }
  }
}

/// Run jobs until every [`ImageQueue`] is dropped, then wait for the
/// remaining downloads. Resolves to the number of jobs processed.
pub fn spawn_prefetcher(
  cache: Arc<ImageCache>,
  mut rx: mpsc::UnboundedReceiver<ImageJob>,
) -> JoinHandle<usize> {
  tokio::spawn(async move {
    let mut tasks = JoinSet::new();
    let mut processed = 0usize;

    while let Some(job) = rx.recv().await {
      let cache = Arc::clone(&cache);
      tasks.spawn(async move {
        let outcome = cache.ensure_cached(&job.source_url, job.partition).await;
        trace!(url = %job.source_url, ?outcome, "prefetch job done");
      });

      // Reap finished tasks so the set does not grow without bound
      while let Some(done) = tasks.try_join_next() {
        if done.is_ok() {
          processed += 1;
        }
      }
    }

    while let Some(done) = tasks.join_next().await {
      if done.is_ok() {
        processed += 1;
      }
    }

    debug!(processed, "image prefetcher stopped");
    processed
  })
}

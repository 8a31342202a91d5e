//! Store traits and the SQLite implementation.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::schema::SCHEMA;
use crate::error::StoreError;
use crate::image::{CachedImage, Partition};
use crate::records::{Domain, Record, RecordId};

/// Changes to apply to one domain in a single step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordDiff {
  /// Ids to remove, applied first
  pub deletes: Vec<RecordId>,
  /// Records to insert or overwrite
  pub upserts: Vec<Record>,
}

impl RecordDiff {
  pub fn is_empty(&self) -> bool {
    self.deletes.is_empty() && self.upserts.is_empty()
  }
}

/// Local structured store of domain records, keyed by natural id.
pub trait ContentStore: Send + Sync {
  /// All records for a domain, ordered by id text.
  fn get_all(&self, domain: Domain) -> Result<Vec<Record>, StoreError>;

  fn get(&self, domain: Domain, id: &RecordId) -> Result<Option<Record>, StoreError>;

  /// Insert or overwrite by id.
  fn put(&self, domain: Domain, record: &Record) -> Result<(), StoreError>;

  /// Returns whether a record was removed.
  fn delete(&self, domain: Domain, id: &RecordId) -> Result<bool, StoreError>;

  fn count(&self, domain: Domain) -> Result<usize, StoreError>;

  /// Apply deletions then upserts atomically. Readers observe the state
  /// before or after, never in between.
  fn apply(&self, domain: Domain, diff: &RecordDiff) -> Result<(), StoreError>;
}

/// Storage for cached image blobs, split by partition.
pub trait ImageStore: Send + Sync {
  fn get_image(&self, partition: Partition, key: &str) -> Result<Option<CachedImage>, StoreError>;

  /// Lookup by original URL, for rows written under an older key scheme.
  fn find_image_by_source(
    &self,
    partition: Partition,
    source_url: &str,
  ) -> Result<Option<CachedImage>, StoreError>;

  /// Upsert by `(partition, key)`. Rows with the same source URL under a
  /// different key are replaced.
  fn put_image(&self, image: &CachedImage) -> Result<(), StoreError>;

  /// Refresh `updated_at` without rewriting the blob.
  fn touch_image(
    &self,
    partition: Partition,
    key: &str,
    at: DateTime<Utc>,
  ) -> Result<bool, StoreError>;

  /// Delete every image last updated before `cutoff`.
  fn sweep_images(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

  fn image_count(&self, partition: Partition) -> Result<usize, StoreError>;
}

/// SQLite-backed record store and image partitions.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the database at `path`.
  pub fn open(path: &Path) -> Result<Self, StoreError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| {
        StoreError::StorageUnavailable(format!(
          "failed to create data directory {}: {}",
          parent.display(),
          e
        ))
      })?;
    }

    let conn = Connection::open(path).map_err(|e| {
      StoreError::StorageUnavailable(format!(
        "failed to open database at {}: {}",
        path.display(),
        e
      ))
    })?;

    Self::with_connection(conn)
  }

  /// An in-memory database, discarded on drop.
  pub fn open_in_memory() -> Result<Self, StoreError> {
    let conn = Connection::open_in_memory()
      .map_err(|e| StoreError::StorageUnavailable(format!("in-memory database: {}", e)))?;
    Self::with_connection(conn)
  }

  /// Default database path under the user data directory.
  pub fn default_path() -> Option<PathBuf> {
    dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .map(|d| d.join("larder").join("larder.db"))
  }

  fn with_connection(conn: Connection) -> Result<Self, StoreError> {
    conn
      .execute_batch(SCHEMA)
      .map_err(|e| StoreError::StorageUnavailable(format!("failed to run migrations: {}", e)))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
    self
      .conn
      .lock()
      .map_err(|e| StoreError::StorageUnavailable(format!("lock poisoned: {}", e)))
  }
}

fn decode_record(data: &[u8]) -> Result<Record, StoreError> {
  Ok(serde_json::from_slice(data)?)
}

/// Raw image row before timestamp and partition decoding.
struct ImageRow {
  partition: String,
  key: String,
  source_url: String,
  blob: Vec<u8>,
  blob_hash: String,
  etag: Option<String>,
  updated_at: i64,
}

const IMAGE_COLUMNS: &str =
  "partition_name, cache_key, source_url, blob, blob_hash, etag, updated_at";

impl ImageRow {
  fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      partition: row.get(0)?,
      key: row.get(1)?,
      source_url: row.get(2)?,
      blob: row.get(3)?,
      blob_hash: row.get(4)?,
      etag: row.get(5)?,
      updated_at: row.get(6)?,
    })
  }

  fn into_image(self) -> Result<CachedImage, StoreError> {
    let partition = self
      .partition
      .parse::<Partition>()
      .map_err(StoreError::Backend)?;
    let updated_at = DateTime::from_timestamp_millis(self.updated_at)
      .ok_or_else(|| StoreError::Backend(format!("bad timestamp {}", self.updated_at)))?;

    Ok(CachedImage {
      partition,
      key: self.key,
      source_url: self.source_url,
      blob: self.blob,
      blob_hash: self.blob_hash,
      etag: self.etag,
      updated_at,
    })
  }
}

impl ContentStore for SqliteStorage {
  fn get_all(&self, domain: Domain) -> Result<Vec<Record>, StoreError> {
    let conn = self.lock()?;
    let mut stmt =
      conn.prepare("SELECT data FROM records WHERE domain = ? ORDER BY record_id")?;

    let rows: Vec<Vec<u8>> = stmt
      .query_map(params![domain.as_str()], |row| row.get(0))?
      .collect::<rusqlite::Result<_>>()?;

    rows.iter().map(|data| decode_record(data)).collect()
  }

  fn get(&self, domain: Domain, id: &RecordId) -> Result<Option<Record>, StoreError> {
    let conn = self.lock()?;
    let data: Option<Vec<u8>> = conn
      .query_row(
        "SELECT data FROM records WHERE domain = ? AND record_id = ?",
        params![domain.as_str(), id.store_key()],
        |row| row.get(0),
      )
      .optional()?;

    data.map(|d| decode_record(&d)).transpose()
  }

  fn put(&self, domain: Domain, record: &Record) -> Result<(), StoreError> {
    let data = serde_json::to_vec(record)?;
    let conn = self.lock()?;
    conn.execute(
      "INSERT OR REPLACE INTO records (domain, record_id, data, stored_at)
       VALUES (?, ?, ?, datetime('now'))",
      params![domain.as_str(), record.id.store_key(), data],
    )?;
    Ok(())
  }

  fn delete(&self, domain: Domain, id: &RecordId) -> Result<bool, StoreError> {
    let conn = self.lock()?;
    let removed = conn.execute(
      "DELETE FROM records WHERE domain = ? AND record_id = ?",
      params![domain.as_str(), id.store_key()],
    )?;
    Ok(removed > 0)
  }

  fn count(&self, domain: Domain) -> Result<usize, StoreError> {
    let conn = self.lock()?;
    let count: i64 = conn.query_row(
      "SELECT COUNT(*) FROM records WHERE domain = ?",
      params![domain.as_str()],
      |row| row.get(0),
    )?;
    usize::try_from(count).map_err(|e| StoreError::Backend(e.to_string()))
  }

  fn apply(&self, domain: Domain, diff: &RecordDiff) -> Result<(), StoreError> {
    if diff.is_empty() {
      return Ok(());
    }

    // Serialize up front so a bad record aborts before the transaction opens
    let encoded: Vec<(String, Vec<u8>)> = diff
      .upserts
      .iter()
      .map(|r| -> Result<(String, Vec<u8>), StoreError> {
        Ok((r.id.store_key(), serde_json::to_vec(r)?))
      })
      .collect::<Result<_, _>>()?;

    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    {
      let mut delete =
        tx.prepare_cached("DELETE FROM records WHERE domain = ? AND record_id = ?")?;
      for id in &diff.deletes {
        delete.execute(params![domain.as_str(), id.store_key()])?;
      }

      let mut upsert = tx.prepare_cached(
        "INSERT OR REPLACE INTO records (domain, record_id, data, stored_at)
         VALUES (?, ?, ?, datetime('now'))",
      )?;
      for (key, data) in &encoded {
        upsert.execute(params![domain.as_str(), key, data])?;
      }
    }
    tx.commit()?;

    Ok(())
  }
}

impl ImageStore for SqliteStorage {
  fn get_image(&self, partition: Partition, key: &str) -> Result<Option<CachedImage>, StoreError> {
    let conn = self.lock()?;
    let row = conn
      .query_row(
        &format!(
          "SELECT {} FROM images WHERE partition_name = ? AND cache_key = ?",
          IMAGE_COLUMNS
        ),
        params![partition.as_str(), key],
        ImageRow::from_row,
      )
      .optional()?;

    row.map(ImageRow::into_image).transpose()
  }

  fn find_image_by_source(
    &self,
    partition: Partition,
    source_url: &str,
  ) -> Result<Option<CachedImage>, StoreError> {
    let conn = self.lock()?;
    let row = conn
      .query_row(
        &format!(
          "SELECT {} FROM images WHERE partition_name = ? AND source_url = ?
           ORDER BY updated_at DESC LIMIT 1",
          IMAGE_COLUMNS
        ),
        params![partition.as_str(), source_url],
        ImageRow::from_row,
      )
      .optional()?;

    row.map(ImageRow::into_image).transpose()
  }

  fn put_image(&self, image: &CachedImage) -> Result<(), StoreError> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;

    tx.execute(
      "DELETE FROM images WHERE partition_name = ? AND source_url = ? AND cache_key <> ?",
      params![image.partition.as_str(), image.source_url, image.key],
    )?;
    tx.execute(
      "INSERT OR REPLACE INTO images
         (partition_name, cache_key, source_url, blob, blob_hash, etag, updated_at)
       VALUES (?, ?, ?, ?, ?, ?, ?)",
      params![
        image.partition.as_str(),
        image.key,
        image.source_url,
        image.blob,
        image.blob_hash,
        image.etag,
        image.updated_at.timestamp_millis(),
      ],
    )?;

    tx.commit()?;
    Ok(())
  }

  fn touch_image(
    &self,
    partition: Partition,
    key: &str,
    at: DateTime<Utc>,
  ) -> Result<bool, StoreError> {
    let conn = self.lock()?;
    let updated = conn.execute(
      "UPDATE images SET updated_at = ? WHERE partition_name = ? AND cache_key = ?",
      params![at.timestamp_millis(), partition.as_str(), key],
    )?;
    Ok(updated > 0)
  }

  fn sweep_images(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
    let conn = self.lock()?;
    let removed = conn.execute(
      "DELETE FROM images WHERE updated_at < ?",
      params![cutoff.timestamp_millis()],
    )?;
    Ok(removed)
  }

  fn image_count(&self, partition: Partition) -> Result<usize, StoreError> {
    let conn = self.lock()?;
    let count: i64 = conn.query_row(
      "SELECT COUNT(*) FROM images WHERE partition_name = ?",
      params![partition.as_str()],
      |row| row.get(0),
    )?;
    usize::try_from(count).map_err(|e| StoreError::Backend(e.to_string()))
  }
}

/// Storage used when the database cannot be opened.
/// Every operation fails with [`StoreError::StorageUnavailable`].
pub struct UnavailableStorage {
  reason: String,
}

impl UnavailableStorage {
  pub fn new(reason: impl Into<String>) -> Self {
    Self {
      reason: reason.into(),
    }
  }

  fn fail<T>(&self) -> Result<T, StoreError> {
    Err(StoreError::StorageUnavailable(self.reason.clone()))
  }
}

impl ContentStore for UnavailableStorage {
  fn get_all(&self, _domain: Domain) -> Result<Vec<Record>, StoreError> {
    self.fail()
  }

  fn get(&self, _domain: Domain, _id: &RecordId) -> Result<Option<Record>, StoreError> {
    self.fail()
  }

  fn put(&self, _domain: Domain, _record: &Record) -> Result<(), StoreError> {
    self.fail()
  }

  fn delete(&self, _domain: Domain, _id: &RecordId) -> Result<bool, StoreError> {
    self.fail()
  }

  fn count(&self, _domain: Domain) -> Result<usize, StoreError> {
    self.fail()
  }

  fn apply(&self, _domain: Domain, _diff: &RecordDiff) -> Result<(), StoreError> {
    self.fail()
  }
}

impl ImageStore for UnavailableStorage {
  fn get_image(&self, _partition: Partition, _key: &str) -> Result<Option<CachedImage>, StoreError> {
    self.fail()
  }

  fn find_image_by_source(
    &self,
    _partition: Partition,
    _source_url: &str,
  ) -> Result<Option<CachedImage>, StoreError> {
    self.fail()
  }

  fn put_image(&self, _image: &CachedImage) -> Result<(), StoreError> {
    self.fail()
  }

  fn touch_image(
    &self,
    _partition: Partition,
    _key: &str,
    _at: DateTime<Utc>,
  ) -> Result<bool, StoreError> {
    self.fail()
  }

  fn sweep_images(&self, _cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
    self.fail()
  }

  fn image_count(&self, _partition: Partition) -> Result<usize, StoreError> {
    self.fail()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  fn image(partition: Partition, key: &str, url: &str, at: DateTime<Utc>) -> CachedImage {
    CachedImage {
      partition,
      key: key.to_string(),
      source_url: url.to_string(),
      blob: vec![1, 2, 3],
      blob_hash: "abc".to_string(),
      etag: Some("\"v1\"".to_string()),
      updated_at: at,
    }
  }

  #[test]
  fn test_put_get_count_delete() {
    let store = SqliteStorage::open_in_memory().unwrap();
    let rose = Record::new(1i64).with("name", "Rose");

    store.put(Domain::Products, &rose).unwrap();
    store.put(Domain::Products, &rose).unwrap();

    assert_eq!(store.count(Domain::Products).unwrap(), 1);
    assert_eq!(store.count(Domain::News).unwrap(), 0);
    assert_eq!(
      store.get(Domain::Products, &RecordId::Int(1)).unwrap(),
      Some(rose)
    );

    assert!(store.delete(Domain::Products, &RecordId::Int(1)).unwrap());
    assert!(!store.delete(Domain::Products, &RecordId::Int(1)).unwrap());
    assert!(store.get_all(Domain::Products).unwrap().is_empty());
  }

  #[test]
  fn test_domains_are_isolated() {
    let store = SqliteStorage::open_in_memory().unwrap();
    store
      .put(Domain::Products, &Record::new("x").with("kind", "product"))
      .unwrap();
    store
      .put(Domain::News, &Record::new("x").with("kind", "news"))
      .unwrap();

    let news = store.get(Domain::News, &RecordId::from("x")).unwrap().unwrap();
    assert_eq!(news.attr_str("kind"), Some("news"));
  }

  #[test]
  fn test_apply_prunes_then_upserts() {
    let store = SqliteStorage::open_in_memory().unwrap();
    store.put(Domain::Batches, &Record::new("a")).unwrap();
    store.put(Domain::Batches, &Record::new("b")).unwrap();

    let diff = RecordDiff {
      deletes: vec![RecordId::from("a")],
      upserts: vec![Record::new("c").with("region_id", 2)],
    };
    store.apply(Domain::Batches, &diff).unwrap();

    let ids: Vec<String> = store
      .get_all(Domain::Batches)
      .unwrap()
      .into_iter()
      .map(|r| r.id.to_string())
      .collect();
    assert_eq!(ids, vec!["b", "c"]);
  }

  #[test]
  fn test_file_backed_store_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("larder.db");

    {
      let store = SqliteStorage::open(&path).unwrap();
      store.put(Domain::News, &Record::new("n1")).unwrap();
    }

    let reopened = SqliteStorage::open(&path).unwrap();
    assert_eq!(reopened.count(Domain::News).unwrap(), 1);
  }

  #[test]
  fn test_image_partitions_are_separate() {
    let store = SqliteStorage::open_in_memory().unwrap();
    let now = Utc::now();
    store
      .put_image(&image(Partition::Product, "k", "https://x/a.png", now))
      .unwrap();

    assert!(store.get_image(Partition::Product, "k").unwrap().is_some());
    assert!(store.get_image(Partition::News, "k").unwrap().is_none());
  }

  #[test]
  fn test_put_image_replaces_legacy_key() {
    let store = SqliteStorage::open_in_memory().unwrap();
    let now = Utc::now();
    store
      .put_image(&image(Partition::News, "legacy", "https://x/a.png", now))
      .unwrap();
    store
      .put_image(&image(Partition::News, "fresh", "https://x/a.png", now))
      .unwrap();

    assert_eq!(store.image_count(Partition::News).unwrap(), 1);
    let found = store
      .find_image_by_source(Partition::News, "https://x/a.png")
      .unwrap()
      .unwrap();
    assert_eq!(found.key, "fresh");
  }

  #[test]
  fn test_touch_and_sweep() {
    let store = SqliteStorage::open_in_memory().unwrap();
    let now = Utc::now();
    let old = now - Duration::days(100);
    store
      .put_image(&image(Partition::Generic, "old", "https://x/old.png", old))
      .unwrap();
    store
      .put_image(&image(Partition::Generic, "new", "https://x/new.png", old))
      .unwrap();
    assert!(store.touch_image(Partition::Generic, "new", now).unwrap());

    let removed = store.sweep_images(now - Duration::days(90)).unwrap();
    assert_eq!(removed, 1);
    assert!(store.get_image(Partition::Generic, "new").unwrap().is_some());
  }

  #[test]
  fn test_unavailable_storage_fails_everything() {
    let store = UnavailableStorage::new("disabled");
    assert!(matches!(
      store.get_all(Domain::Products),
      Err(StoreError::StorageUnavailable(_))
    ));
    assert!(matches!(
      store.get_image(Partition::Product, "k"),
      Err(StoreError::StorageUnavailable(_))
    ));
  }
}

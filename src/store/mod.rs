//! Local persistence for domain records and cached image blobs.
//!
//! Both live in one SQLite database:
//! - `records` holds serialized records keyed by `(domain, id)`
//! - `images` holds blobs keyed by `(partition, sha256(url))`

mod schema;
mod storage;

pub use storage::{ContentStore, ImageStore, RecordDiff, SqliteStorage, UnavailableStorage};

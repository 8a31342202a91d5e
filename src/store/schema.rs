/// Schema for the record store and image partitions.
pub const SCHEMA: &str = r#"
-- Domain records (serialized JSON), keyed by natural id
CREATE TABLE IF NOT EXISTS records (
    domain TEXT NOT NULL,
    record_id TEXT NOT NULL,
    data BLOB NOT NULL,
    stored_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (domain, record_id)
);

-- Content-addressed image blobs, one partition per image domain
CREATE TABLE IF NOT EXISTS images (
    partition_name TEXT NOT NULL,
    cache_key TEXT NOT NULL,
    source_url TEXT NOT NULL,
    blob BLOB NOT NULL,
    blob_hash TEXT NOT NULL,
    etag TEXT,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (partition_name, cache_key)
);

CREATE INDEX IF NOT EXISTS idx_images_source
    ON images(partition_name, source_url);

CREATE INDEX IF NOT EXISTS idx_images_updated
    ON images(updated_at);
"#;

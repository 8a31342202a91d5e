//! Normalized records for the products, news and batches domains.

mod api_types;
mod payload;
mod types;

pub use payload::parse_payload;
pub use types::{Domain, Record, RecordId};

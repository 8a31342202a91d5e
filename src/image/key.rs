//! Cache keys for image URLs.

use sha2::{Digest, Sha256};
use url::Url;

/// Canonical form of an image URL.
///
/// Parsing lower-cases the scheme and host and drops a default port; the
/// fragment never reaches the server and is removed. Strings that do not
/// parse as a URL are used verbatim after trimming.
pub fn canonicalize(source_url: &str) -> String {
  let trimmed = source_url.trim();
  match Url::parse(trimmed) {
    Ok(mut url) => {
      url.set_fragment(None);
      url.into()
    }
    Err(_) => trimmed.to_string(),
  }
}

/// Store key for an image URL: sha256 hex of the canonical URL.
pub fn cache_key(source_url: &str) -> String {
  sha256_hex(canonicalize(source_url).as_bytes())
}

/// sha256 hex of arbitrary bytes, used for blob hashes.
pub fn sha256_hex(bytes: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  hex::encode(hasher.finalize())
}

//! Remote data sources for the synced domains.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{PayloadError, SyncError};
use crate::records::{parse_payload, Domain, Record};

/// Source of fresh snapshots for a domain.
#[async_trait]
pub trait RemoteSource: Send + Sync {
  async fn fetch_records(&self, domain: Domain) -> Result<Vec<Record>, SyncError>;
}

/// Fetches JSON from one endpoint per domain.
#[derive(Clone)]
pub struct HttpRemoteSource {
  client: reqwest::Client,
  endpoints: HashMap<Domain, Url>,
}

impl HttpRemoteSource {
  pub fn new(client: reqwest::Client, endpoints: HashMap<Domain, Url>) -> Self {
    Self { client, endpoints }
  }

  /// Client with the request timeout applied.
  pub fn client_with_timeout(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("larder/", env!("CARGO_PKG_VERSION")))
      .build()
  }
}

#[async_trait]
impl RemoteSource for HttpRemoteSource {
  async fn fetch_records(&self, domain: Domain) -> Result<Vec<Record>, SyncError> {
    let url = self
      .endpoints
      .get(&domain)
      .ok_or(SyncError::NoSource(domain))?;

    let response = self
      .client
      .get(url.clone())
      .send()
      .await
      .map_err(|e| SyncError::RemoteUnreachable(format!("{}: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
      return Err(SyncError::RemoteUnreachable(format!(
        "{} returned {}",
        url, status
      )));
    }

    let payload: serde_json::Value = response
      .json()
      .await
      .map_err(|e| PayloadError::Shape(format!("invalid json from {}: {}", url, e)))?;

    let records = parse_payload(domain, payload)?;
    debug!(%domain, count = records.len(), "remote snapshot fetched");
    Ok(records)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_missing_endpoint_is_reported() {
    let source = HttpRemoteSource::new(reqwest::Client::new(), HashMap::new());
    let err = source.fetch_records(Domain::News).await.unwrap_err();
    assert!(matches!(err, SyncError::NoSource(Domain::News)));
  }
}

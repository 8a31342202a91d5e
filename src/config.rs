use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::controller::SyncSettings;
use crate::image::CacheTtls;
use crate::records::Domain;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  /// Database file (defaults to the user data directory)
  pub database: Option<PathBuf>,
  /// Remote endpoint per domain
  #[serde(default)]
  pub sources: HashMap<Domain, Url>,
  #[serde(default)]
  pub images: ImagesConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub sync: SyncConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImagesConfig {
  /// Same-origin image proxy, called as `<proxy_url>?url=<source>`
  pub proxy_url: Option<Url>,
  /// Endpoint returning `{hash, etag}` for `?url=<source>`
  pub metadata_url: Option<Url>,
  /// Refuse direct fetches of plain http:// images
  #[serde(default = "default_true")]
  pub block_mixed_content: bool,
}

impl Default for ImagesConfig {
  fn default() -> Self {
    Self {
      proxy_url: None,
      metadata_url: None,
      block_mixed_content: true,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub product_ttl_days: u32,
  pub news_ttl_days: u32,
  pub generic_ttl_days: u32,
  pub sweep_ttl_days: u32,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      product_ttl_days: 7,
      news_ttl_days: 30,
      generic_ttl_days: 7,
      sweep_ttl_days: 90,
    }
  }
}

impl CacheConfig {
  pub fn ttls(&self) -> CacheTtls {
    let days = |d: u32| chrono::Duration::days(i64::from(d));
    CacheTtls {
      product: days(self.product_ttl_days),
      news: days(self.news_ttl_days),
      generic: days(self.generic_ttl_days),
      sweep: days(self.sweep_ttl_days),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  pub retry_interval_secs: u64,
  pub allow_metered: bool,
  /// Treat the connection as metered (overridden by LARDER_METERED)
  pub metered: bool,
  pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      retry_interval_secs: 60,
      allow_metered: false,
      metered: false,
      request_timeout_secs: 20,
    }
  }
}

impl SyncConfig {
  pub fn settings(&self) -> SyncSettings {
    SyncSettings {
      retry_interval: Duration::from_secs(self.retry_interval_secs.max(1)),
      allow_metered: self.allow_metered,
    }
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs.max(1))
  }
}

fn default_true() -> bool {
  true
}

/// Files tried in order when no path is given.
fn config_candidates() -> Vec<PathBuf> {
  let mut candidates = vec![PathBuf::from("larder.yaml")];
  if let Some(dir) = dirs::config_dir() {
    candidates.push(dir.join("larder").join("config.yaml"));
  }
  candidates
}

/// Parse a boolean environment override such as `LARDER_METERED=1`.
fn env_flag(name: &str) -> Option<bool> {
  let value = std::env::var(name).ok()?;
  match value.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Some(true),
    "0" | "false" | "no" | "off" => Some(false),
    _ => None,
  }
}

impl Config {
  /// Load the config from `explicit`, or from the first of `./larder.yaml`
  /// and `$XDG_CONFIG_HOME/larder/config.yaml` that exists.
  pub fn load(explicit: Option<&Path>) -> Result<Self> {
    let path = match explicit {
      Some(p) if p.exists() => p.to_path_buf(),
      Some(p) => return Err(eyre!("Config file not found: {}", p.display())),
      None => config_candidates()
        .into_iter()
        .find(|p| p.exists())
        .ok_or_else(|| {
          eyre!("No configuration file found. Create one at ~/.config/larder/config.yaml")
        })?,
    };

    Self::from_file(&path)
  }

  /// Read, parse and validate one config file.
  pub fn from_file(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))
  }

  /// Parse YAML and reject a sweep window shorter than any soft TTL.
  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;

    let cache = &config.cache;
    let longest_soft = cache
      .product_ttl_days
      .max(cache.news_ttl_days)
      .max(cache.generic_ttl_days);
    if cache.sweep_ttl_days < longest_soft {
      return Err(eyre!(
        "cache.sweep_ttl_days ({}) must not be shorter than the longest ttl ({})",
        cache.sweep_ttl_days,
        longest_soft
      ));
    }

    Ok(config)
  }

  /// Database path, honouring the LARDER_DATABASE override.
  pub fn database_path(&self) -> Option<PathBuf> {
    std::env::var_os("LARDER_DATABASE")
      .map(PathBuf::from)
      .or_else(|| self.database.clone())
      .or_else(crate::store::SqliteStorage::default_path)
  }

  /// Whether to treat the connection as metered, honouring LARDER_METERED.
  pub fn metered(&self) -> bool {
    env_flag("LARDER_METERED").unwrap_or(self.sync.metered)
  }
}

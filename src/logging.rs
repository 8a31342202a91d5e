use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber, writing to a daily log file in `dir`.
///
/// The filter comes from `LARDER_LOG` (default `info`). Keep the returned
/// guard alive for the life of the process or buffered lines are lost.
pub fn init(dir: &Path) -> WorkerGuard {
  let filter = EnvFilter::try_from_env("LARDER_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  let appender = tracing_appender::rolling::daily(dir, "larder.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  tracing::info!(dir = %dir.display(), "logging initialized");
  guard
}

/// Directory for log files next to the database.
pub fn default_dir() -> std::path::PathBuf {
  dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .map(|d| d.join("larder").join("logs"))
    .unwrap_or_else(|| std::path::PathBuf::from("logs"))
}

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use tokio::sync::watch;
use tokio::task::JoinSet;

use larder::app::App;
use larder::config::Config;
use larder::controller::{ControllerEvent, ViewStatus};
use larder::image::Partition;
use larder::records::Domain;

#[derive(Parser, Debug)]
#[command(name = "larder")]
#[command(about = "Offline-first local cache and sync for storefront content")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/larder/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Load local records for a domain and sync once against the remote
  Sync { domain: Domain },
  /// Keep every configured domain in sync until interrupted
  Watch,
  /// Show local record and image counts
  Status,
  /// Delete images older than the sweep ttl
  Sweep,
  /// Download an image into the cache now
  Fetch {
    url: String,
    #[arg(short, long, default_value = "generic")]
    partition: Partition,
    /// Rewrite the entry even if it is fresh and unchanged
    #[arg(long)]
    force: bool,
  },
  /// Print the display source for an image URL
  Resolve {
    url: String,
    #[arg(short, long, default_value = "generic")]
    partition: Partition,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;

  let log_dir = larder::logging::default_dir();
  std::fs::create_dir_all(&log_dir)?;
  let _guard = larder::logging::init(&log_dir);

  let app = App::new(config)?;

  match args.command {
    Command::Sync { domain } => {
      let status = app.sync_once(domain).await;
      print_status(domain, &status);
    }
    Command::Watch => watch_all(&app).await,
    Command::Status => {
      for domain in Domain::ALL {
        match app.count(domain) {
          Ok(n) => println!("{:<10} {} records", domain, n),
          Err(e) => println!("{:<10} unavailable ({})", domain, e),
        }
      }
      for partition in Partition::ALL {
        match app.image_count(partition) {
          Ok(n) => println!("{:<10} {} images", partition, n),
          Err(e) => println!("{:<10} unavailable ({})", partition, e),
        }
      }
    }
    Command::Sweep => {
      let removed = app.sweep()?;
      println!("Removed {} expired images", removed);
    }
    Command::Fetch {
      url,
      partition,
      force,
    } => {
      let outcome = app.fetch_image(&url, partition, force).await;
      println!("{:?}", outcome);
    }
    Command::Resolve { url, partition } => {
      let source = app.resolve(&url, partition);
      let kind = if source.is_local() { "local" } else { "remote" };
      println!("{} {}", kind, source.url());
    }
  }

  let downloaded = app.shutdown().await;
  if downloaded > 0 {
    println!("Processed {} image jobs", downloaded);
  }

  Ok(())
}

async fn watch_all(app: &App) {
  let domains = app.configured_domains();
  if domains.is_empty() {
    eprintln!("No sources configured");
    return;
  }

  let (stop_tx, stop_rx) = watch::channel(false);
  let mut tasks = JoinSet::new();

  for domain in domains {
    let (mut controller, mut events) = app.controller(domain);
    let online = app.network().subscribe();
    let mut stop = stop_rx.clone();

    tasks.spawn(async move {
      controller.load_local();
      controller.sync_remote().await;
      controller
        .run(online, async move {
          let _ = stop.changed().await;
        })
        .await;
    });

    tasks.spawn(async move {
      while let Some(event) = events.recv().await {
        print_event(domain, &event);
      }
    });
  }

  if let Err(e) = tokio::signal::ctrl_c().await {
    eprintln!("Failed to listen for interrupt: {}", e);
  }
  let _ = stop_tx.send(true);
  while tasks.join_next().await.is_some() {}
}

fn print_status(domain: Domain, status: &ViewStatus) {
  let source = if status.using_cache { "cache" } else { "remote" };
  println!(
    "{}: {:?}, {} records from {}",
    domain,
    status.phase,
    status.records.len(),
    source
  );
  if let Some(message) = &status.error_message {
    eprintln!("{}: {}", domain, message);
  }
}

fn print_event(domain: Domain, event: &ControllerEvent) {
  match event {
    ControllerEvent::LocalLoaded { count } => println!("{}: {} cached records", domain, count),
    ControllerEvent::MustConnect => println!("{}: connect to load content", domain),
    ControllerEvent::Updated { records } => {
      println!("{}: updated, {} records", domain, records.len())
    }
    ControllerEvent::Unchanged => println!("{}: up to date", domain),
    ControllerEvent::SyncFailed { message } => eprintln!("{}: sync failed: {}", domain, message),
    ControllerEvent::Skipped { reason } => println!("{}: sync skipped ({:?})", domain, reason),
  }
}

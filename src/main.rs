mod app;
mod cache;
mod commands;
mod config;
mod crms;
mod event;
mod query;
mod ui;

use cache::{PersistentStore, SqliteStore};
use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "crms")]
#[command(about = "A terminal UI for classroom records dashboards, inspired by k9s")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/crms/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Faculty id whose classes to browse
  #[arg(short, long)]
  faculty: Option<i64>,

  /// Department label shown in the header
  #[arg(short, long)]
  department: Option<String>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Create the local cache database and exit
  Init,
  /// Print persistent cache statistics and exit
  CacheStats,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  match args.command {
    Some(Command::Init) => return init_cache(),
    Some(Command::CacheStats) => return cache_stats(),
    None => {}
  }

  // Stdout belongs to the TUI; logs go to a rolling file instead.
  let _log_guard = init_tracing()?;

  // Load configuration, with command-line overrides
  let config = config::Config::load(args.config.as_deref())?;
  let config = config::Config {
    faculty_id: args.faculty.or(config.faculty_id),
    default_department: args.department.or(config.default_department),
    ..config
  };

  let mut app = app::App::new(config)?;
  app.run().await?;

  Ok(())
}

/// One-shot cache database setup. Opening the store runs the migrations; a
/// failed open (the connectivity check) is the only first-class error.
fn init_cache() -> Result<()> {
  let _store = SqliteStore::open()?;
  println!(
    "Cache database ready at {}",
    SqliteStore::default_path()?.display()
  );
  Ok(())
}

fn cache_stats() -> Result<()> {
  let store = SqliteStore::open()?;
  println!("Cache database: {}", SqliteStore::default_path()?.display());
  println!("Total payload bytes: {}", store.total_bytes());
  for (entity_type, count) in store.type_counts() {
    println!("  {:<16} {} entries", entity_type, count);
  }
  Ok(())
}

fn init_tracing() -> Result<tracing_appender::non_blocking::WorkerGuard> {
  let log_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .map(|p| p.join("crms").join("logs"))
    .ok_or_else(|| color_eyre::eyre::eyre!("Could not determine data directory"))?;
  std::fs::create_dir_all(&log_dir)?;

  let appender = tracing_appender::rolling::daily(log_dir, "crms.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_env("CRMS_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

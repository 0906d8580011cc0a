//! muster-server binary.
//!
//! `muster-server [--config muster.toml]` serves the attendance API from a
//! local SQLite file. `muster-server hash-password` reads a password on stdin
//! and prints the argon2 PHC string for an entry under `admins`:
//!
//! ```text
//! cargo run -p muster-server -- hash-password
//! ```

use std::{
  io::{self, BufRead as _, Write as _},
  net::SocketAddr,
  path::Path,
  sync::Arc,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::{Parser, Subcommand};
use muster_server::{ServerConfig, app_state};
use muster_store_sqlite::SqliteStore;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Muster attendance server")]
struct Cli {
  /// Path to the TOML configuration file; `MUSTER_*` variables override it.
  #[arg(short, long, global = true, default_value = "muster.toml")]
  config: std::path::PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
  /// Serve the HTTP API (the default).
  Serve,
  /// Print the argon2 hash of a password read from stdin.
  HashPassword,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  init_tracing();
  let cli = Cli::parse();

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(&cli.config).await,
    Command::HashPassword => hash_password(),
  }
}

/// `RUST_LOG` wins; otherwise info and above.
fn init_tracing() {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();
}

async fn serve(config_path: &Path) -> anyhow::Result<()> {
  let config = ServerConfig::load(config_path)
    .with_context(|| format!("failed to load configuration from {}", config_path.display()))?;
  if config.admins.is_empty() {
    tracing::warn!("no admins configured; /admin endpoints will reject every request");
  }

  let store_path = config.resolved_store_path();
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {}", store_path.display()))?;

  let app = muster_server::router(app_state(Arc::new(store), &config));
  let address = config.bind_address();
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  tracing::info!(
    %address,
    window_policy = ?config.window_policy,
    utc_offset_minutes = config.utc_offset_minutes,
    uniform_not_found = config.uniform_not_found,
    "listening"
  );

  // Peer addresses feed the ledger when no forwarded header is trusted.
  axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")
}

/// Resolves on Ctrl-C. If the handler cannot be installed the server runs
/// until killed.
async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}

fn hash_password() -> anyhow::Result<()> {
  // Prompt on stderr so stdout carries only the hash.
  eprint!("Password: ");
  io::stderr().flush().ok();

  let mut line = String::new();
  io::stdin().lock().read_line(&mut line).context("failed to read stdin")?;
  let password = line.trim_end_matches(['\r', '\n']);
  anyhow::ensure!(!password.is_empty(), "refusing to hash an empty password");

  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
  println!("{hash}");
  Ok(())
}

//! claimpay-api server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite ledger, and serves the payout API over HTTP.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use claimpay_api::{ApiConfig, AppState, ServerConfig};
use claimpay_dlocal::{DlocalClient, DlocalConfig, HttpNotifier, NotifierConfig};
use claimpay_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "ClaimPay payout API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("CLAIMPAY"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open the SQLite ledger.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Provider client. Incoming webhook deliveries need a public address.
  let notification_url = server_cfg
    .public_base_url
    .as_deref()
    .map(|base| format!("{}/webhooks/dlocal", base.trim_end_matches('/')));
  let provider = DlocalClient::new(DlocalConfig {
    base_url: server_cfg.dlocal_base_url.clone(),
    api_key: server_cfg.dlocal_api_key.clone(),
    secret_key: server_cfg.dlocal_secret_key.clone(),
    sandbox: server_cfg.dlocal_sandbox,
    notification_url,
  })
  .context("failed to build dLocal client")?;

  if server_cfg.dlocal_sandbox {
    tracing::info!("dLocal client running in sandbox mode");
  }

  let notifier = HttpNotifier::new(NotifierConfig {
    endpoint: server_cfg.email_endpoint.clone(),
  })
  .context("failed to build notifier")?;

  // Build application state.
  let state = AppState {
    store:    Arc::new(store),
    provider: Arc::new(provider),
    notifier: Arc::new(notifier),
    config:   Arc::new(ApiConfig {
      webhook_secret: server_cfg
        .webhook_secret
        .clone()
        .filter(|s| !s.is_empty()),
      max_retries:    server_cfg.max_retries,
    }),
  };

  let app = claimpay_api::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

//! `recon` — scheduled reconciliation job for the ClaimPay ledger.
//!
//! Intended to run from cron. With no subcommand it runs the full pipeline:
//! ingest new bank statements, trigger payouts whose holding window has
//! elapsed, then report credits still awaiting a manual match.
//!
//! # Usage
//!
//! ```
//! recon                      # full pipeline
//! recon ingest               # statements only
//! recon payouts              # trigger only
//! recon unmatched            # report only
//! recon match <id> <claim>   # manually match one credit
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context as _, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use claimpay_core::{
  engine::{IngestPolicy, IngestSummary, ReconciliationEngine},
  store::ReconciliationStore,
  trigger::{AmountPolicy, PayoutTrigger, TriggerPolicy},
};
use claimpay_dlocal::{DlocalClient, DlocalConfig};
use claimpay_statement::StatementKind;
use claimpay_store_sqlite::SqliteStore;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "recon", about = "ClaimPay bank reconciliation job")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Ingest bank statement files and match credits to claims.
  Ingest,
  /// Submit payouts for matched credits past the holding window.
  Payouts,
  /// List credits awaiting a manual match.
  Unmatched,
  /// Manually match a credit to a claim.
  Match {
    reconciliation_id: Uuid,
    claim_id:          String,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Job configuration, deserialised from `config.toml` or `CLAIMPAY_*`
/// environment variables. Shares the file with the API server; unknown keys
/// are ignored.
#[derive(Deserialize, Clone)]
struct JobConfig {
  #[serde(default = "default_store_path")]
  store_path:         PathBuf,
  #[serde(default = "default_statements_dir")]
  statements_dir:     PathBuf,
  #[serde(default = "default_min_amount")]
  min_amount_eur:     f64,
  #[serde(default = "default_delay_hours")]
  payout_delay_hours: i64,
  #[serde(default = "default_dlocal_base_url")]
  dlocal_base_url:    String,
  #[serde(default)]
  dlocal_api_key:     String,
  #[serde(default)]
  dlocal_secret_key:  String,
  #[serde(default = "default_true")]
  dlocal_sandbox:     bool,
}

fn default_store_path() -> PathBuf { PathBuf::from("payouts.db") }
fn default_statements_dir() -> PathBuf { PathBuf::from("bank_statements") }
fn default_min_amount() -> f64 { IngestPolicy::default().min_amount_eur }
fn default_delay_hours() -> i64 { TriggerPolicy::default().payout_delay_hours }
fn default_dlocal_base_url() -> String { "https://sandbox.dlocal.com".to_string() }
fn default_true() -> bool { true }

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("CLAIMPAY"))
    .build()
    .context("failed to read config file")?;
  let cfg: JobConfig = settings
    .try_deserialize()
    .context("failed to deserialise JobConfig")?;

  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;
  let store = Arc::new(store);

  match cli.command {
    Some(Command::Ingest) => {
      run_ingest(&store, &cfg).await?;
    }
    Some(Command::Payouts) => {
      run_payouts(&store, &cfg).await?;
    }
    Some(Command::Unmatched) => {
      run_unmatched(&store).await?;
    }
    Some(Command::Match { reconciliation_id, claim_id }) => {
      run_match(&store, reconciliation_id, &claim_id).await?;
    }
    None => {
      run_ingest(&store, &cfg).await?;
      run_payouts(&store, &cfg).await?;
      run_unmatched(&store).await?;
    }
  }

  Ok(())
}

// ─── Pipeline steps ───────────────────────────────────────────────────────────

/// Parse every statement file in the configured directory, ingest its
/// credits, and move the file out of the way.
async fn run_ingest(store: &Arc<SqliteStore>, cfg: &JobConfig) -> Result<()> {
  let dir = &cfg.statements_dir;
  if !dir.is_dir() {
    println!("No statements directory at {:?}, nothing to ingest", dir);
    return Ok(());
  }

  let engine = ReconciliationEngine::new(
    store.as_ref(),
    IngestPolicy { min_amount_eur: cfg.min_amount_eur },
  );

  let mut entries = std::fs::read_dir(dir)
    .with_context(|| format!("failed to read {dir:?}"))?
    .filter_map(|e| e.ok().map(|e| e.path()))
    .filter(|p| p.is_file())
    .collect::<Vec<_>>();
  entries.sort();

  let mut total = IngestSummary::default();
  let mut files = 0u32;
  for path in entries {
    // Editor droppings and in-progress uploads.
    if path
      .file_name()
      .and_then(|n| n.to_str())
      .is_none_or(|n| n.starts_with('.'))
    {
      continue;
    }
    let Some(kind) = StatementKind::from_path(&path) else {
      tracing::debug!(path = %path.display(), "skipping non-statement file");
      continue;
    };

    // An unreadable file must not sink the batch: report it, treat it as
    // zero transactions, and keep going.
    let transactions = match claimpay_statement::read_statement(&path, kind) {
      Ok(transactions) => transactions,
      Err(e) => {
        tracing::warn!(
          path = %path.display(),
          error = %e,
          "unreadable statement file, treating as empty"
        );
        Vec::new()
      }
    };
    tracing::info!(
      path = %path.display(),
      transactions = transactions.len(),
      "parsed statement"
    );

    let summary = engine.ingest(&transactions).await?;
    total.imported += summary.imported;
    total.matched += summary.matched;
    total.below_min += summary.below_min;
    total.duplicates += summary.duplicates;
    files += 1;

    archive_statement(dir, &path)?;
  }

  println!(
    "Ingest: {files} file(s), {} imported ({} matched), {} below minimum, {} duplicates",
    total.imported, total.matched, total.below_min, total.duplicates,
  );
  Ok(())
}

/// Move a processed statement into `processed/`, prefixed with a timestamp
/// so re-deliveries of a same-named file never collide.
fn archive_statement(dir: &Path, path: &Path) -> Result<()> {
  let processed = dir.join("processed");
  std::fs::create_dir_all(&processed)
    .with_context(|| format!("failed to create {processed:?}"))?;

  let name = path
    .file_name()
    .and_then(|n| n.to_str())
    .unwrap_or("statement");
  let dest = processed.join(format!("{}_{name}", Utc::now().format("%Y%m%d_%H%M%S")));
  std::fs::rename(path, &dest)
    .with_context(|| format!("failed to move {path:?} to {dest:?}"))?;
  tracing::info!(from = %path.display(), to = %dest.display(), "archived statement");
  Ok(())
}

/// Submit payouts for matched credits whose holding window has elapsed.
async fn run_payouts(store: &Arc<SqliteStore>, cfg: &JobConfig) -> Result<()> {
  let provider = DlocalClient::new(DlocalConfig {
    base_url:         cfg.dlocal_base_url.clone(),
    api_key:          cfg.dlocal_api_key.clone(),
    secret_key:       cfg.dlocal_secret_key.clone(),
    sandbox:          cfg.dlocal_sandbox,
    notification_url: None,
  })
  .context("failed to build dLocal client")?;
  if cfg.dlocal_sandbox {
    tracing::info!("dLocal client running in sandbox mode");
  }

  let trigger = PayoutTrigger::new(
    store.as_ref(),
    &provider,
    TriggerPolicy {
      payout_delay_hours: cfg.payout_delay_hours,
      amount_policy:      AmountPolicy::Any,
    },
  );
  let summary = trigger.run().await?;

  println!(
    "Payouts: {} triggered, {} failed, {} waiting, {} already paid, {} without recipient",
    summary.triggered,
    summary.failed,
    summary.waiting,
    summary.already_paid,
    summary.no_recipient,
  );
  Ok(())
}

/// Print credits that could not be matched automatically.
async fn run_unmatched(store: &Arc<SqliteStore>) -> Result<()> {
  let pending = store.pending_reconciliations().await?;
  if pending.is_empty() {
    println!("Unmatched: none");
    return Ok(());
  }

  println!("Unmatched: {} credit(s) need manual review", pending.len());
  for record in pending {
    println!(
      "  {}  {:>10.2} EUR  received {}  ref {:?}",
      record.id,
      record.amount_eur,
      record.received_at.format("%Y-%m-%d"),
      record.bank_ref,
    );
  }
  Ok(())
}

/// Manually match one credit to a claim.
async fn run_match(store: &Arc<SqliteStore>, id: Uuid, claim_id: &str) -> Result<()> {
  if !store.manual_match(id, claim_id).await? {
    bail!("reconciliation {id} not found or already matched");
  }
  println!("Matched reconciliation {id} to claim {claim_id}");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn temp_statements_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("claimpay-recon-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
  }

  fn job_config(dir: &Path) -> JobConfig {
    JobConfig {
      store_path:         PathBuf::from("unused.db"),
      statements_dir:     dir.to_path_buf(),
      min_amount_eur:     default_min_amount(),
      payout_delay_hours: default_delay_hours(),
      dlocal_base_url:    default_dlocal_base_url(),
      dlocal_api_key:     String::new(),
      dlocal_secret_key:  String::new(),
      dlocal_sandbox:     true,
    }
  }

  #[tokio::test]
  async fn unreadable_statement_does_not_sink_the_batch() {
    let dir = temp_statements_dir();
    // Sorts before the good file, so the bad one is hit first.
    std::fs::write(dir.join("a_bad.csv"), [0xFF, 0xFE, 0x00, 0x9F]).unwrap();
    std::fs::write(
      dir.join("b_good.csv"),
      "Date,Description,Credit,Debit,Reference\n\
       2024-06-01,SEPA CREDIT,400.00,,UNRELATED WIRE 555\n",
    )
    .unwrap();

    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    run_ingest(&store, &job_config(&dir)).await.unwrap();

    // The good file was still ingested.
    let pending = store.pending_reconciliations().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].bank_ref, "UNRELATED WIRE 555");

    // Both files were archived out of the inbox.
    assert!(!dir.join("a_bad.csv").exists());
    assert!(!dir.join("b_good.csv").exists());
    let archived = std::fs::read_dir(dir.join("processed")).unwrap().count();
    assert_eq!(archived, 2);

    std::fs::remove_dir_all(&dir).ok();
  }
}

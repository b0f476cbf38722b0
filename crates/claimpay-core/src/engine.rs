//! Reconciliation engine — turns parsed bank transactions into
//! reconciliation records, deduplicated and matched to claims.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  matcher::match_claim_reference,
  reconciliation::ReconciliationRecord,
  store::{ReconciliationStore, RecipientStore},
};

// ─── Input ───────────────────────────────────────────────────────────────────

/// A normalized credit transaction from a bank statement.
/// Produced by `claimpay-statement`; the date is kept as the raw statement
/// string and interpreted at ingest time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
  pub date:        String,
  pub description: String,
  pub amount:      f64,
  pub reference:   String,
}

// ─── Policy and summary ──────────────────────────────────────────────────────

/// Ingest policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct IngestPolicy {
  /// Credits below this are treated as fees or noise, not compensation
  /// payments, and skipped.
  pub min_amount_eur: f64,
}

impl Default for IngestPolicy {
  fn default() -> Self {
    Self { min_amount_eur: 50.0 }
  }
}

/// Counts reported by one ingest run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
  /// New reconciliation records written.
  pub imported:     u32,
  /// Of those, records matched to a claim with a verified recipient.
  pub matched:      u32,
  /// Transactions below the minimum amount.
  pub below_min:    u32,
  /// Transactions whose bank reference was already reconciled.
  pub duplicates:   u32,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct ReconciliationEngine<'a, S> {
  store:  &'a S,
  policy: IngestPolicy,
}

impl<'a, S, E> ReconciliationEngine<'a, S>
where
  S: ReconciliationStore<Error = E> + RecipientStore<Error = E>,
  E: std::error::Error + Send + Sync + 'static,
{
  pub fn new(store: &'a S, policy: IngestPolicy) -> Self {
    Self { store, policy }
  }

  /// Ingest a batch of transactions, writing one reconciliation record per
  /// new bank reference. Idempotent: re-ingesting the same statement is a
  /// stream of duplicates.
  pub async fn ingest(&self, transactions: &[Transaction]) -> Result<IngestSummary, E> {
    let mut summary = IngestSummary::default();

    for txn in transactions {
      if txn.amount < self.policy.min_amount_eur {
        summary.below_min += 1;
        continue;
      }

      // The reference field can be empty on some statement rows; fall back
      // to the description, which carries the sender's free text.
      let reference = if txn.reference.trim().is_empty() {
        txn.description.as_str()
      } else {
        txn.reference.as_str()
      };

      if self.store.reconciliation_exists(reference).await? {
        summary.duplicates += 1;
        continue;
      }

      let received_at = parse_received_at(&txn.date);
      let claim_id = match_claim_reference(reference);

      let record = match claim_id {
        Some(ref id) if self.store.verified_recipient_exists(id).await? => {
          tracing::info!(
            amount = txn.amount,
            claim_id = %id,
            "matched bank credit to claim"
          );
          summary.matched += 1;
          ReconciliationRecord::matched(reference, txn.amount, received_at, id.clone())
        }
        _ => {
          tracing::info!(
            amount = txn.amount,
            reference = %reference,
            "unmatched bank credit, queued for manual review"
          );
          ReconciliationRecord::unmatched(reference, txn.amount, received_at)
        }
      };

      self.store.insert_reconciliation(record).await?;
      summary.imported += 1;
    }

    Ok(summary)
  }
}

// ─── Date handling ───────────────────────────────────────────────────────────

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y%m%d"];

/// Interpret a statement date string as midnight UTC. Statements use a
/// handful of regional formats; an unparseable date falls back to now rather
/// than aborting the row.
pub fn parse_received_at(date: &str) -> DateTime<Utc> {
  for fmt in DATE_FORMATS {
    if let Ok(d) = NaiveDate::parse_from_str(date.trim(), fmt) {
      if let Some(dt) = d.and_hms_opt(0, 0, 0) {
        return dt.and_utc();
      }
    }
  }
  Utc::now()
}

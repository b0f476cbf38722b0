//! ReconciliationRecord — one row per distinct incoming bank credit.
//!
//! A record moves `PendingMatch -> Matched -> PayoutCreated` and never
//! regresses; `PayoutFailed` (with diagnostic notes) is the only other exit
//! from `Matched`. The payout trigger is the sole writer that takes a record
//! out of `Matched`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
  PendingMatch,
  Matched,
  PayoutCreated,
  PayoutFailed,
}

impl ReconciliationStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::PendingMatch => "pending_match",
      Self::Matched => "matched",
      Self::PayoutCreated => "payout_created",
      Self::PayoutFailed => "payout_failed",
    }
  }
}

impl fmt::Display for ReconciliationStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A persisted bank-credit record and its match state.
/// `bank_ref` is the dedup key: unique across all records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationRecord {
  pub id:               Uuid,
  pub bank_ref:         String,
  #[serde(rename = "amountEUR")]
  pub amount_eur:       f64,
  pub received_at:      DateTime<Utc>,
  pub matched_claim_id: Option<String>,
  pub matched_at:       Option<DateTime<Utc>>,
  pub status:           ReconciliationStatus,
  pub notes:            Option<String>,
  pub created_at:       DateTime<Utc>,
}

impl ReconciliationRecord {
  /// Build an unmatched record for manual review.
  pub fn unmatched(
    bank_ref: impl Into<String>,
    amount_eur: f64,
    received_at: DateTime<Utc>,
  ) -> Self {
    Self {
      id:               Uuid::new_v4(),
      bank_ref:         bank_ref.into(),
      amount_eur,
      received_at,
      matched_claim_id: None,
      matched_at:       None,
      status:           ReconciliationStatus::PendingMatch,
      notes:            None,
      created_at:       Utc::now(),
    }
  }

  /// Build a record already matched to a claim.
  pub fn matched(
    bank_ref: impl Into<String>,
    amount_eur: f64,
    received_at: DateTime<Utc>,
    claim_id: impl Into<String>,
  ) -> Self {
    let now = Utc::now();
    Self {
      id:               Uuid::new_v4(),
      bank_ref:         bank_ref.into(),
      amount_eur,
      received_at,
      matched_claim_id: Some(claim_id.into()),
      matched_at:       Some(now),
      status:           ReconciliationStatus::Matched,
      notes:            None,
      created_at:       now,
    }
  }
}

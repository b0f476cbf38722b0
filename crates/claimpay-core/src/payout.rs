//! Payout — the ledger record for one transfer to a claimant, and the state
//! machine that governs its lifecycle.
//!
//! Status is monotonic along the transition graph below. The only backward
//! edge is `Failed -> Queued`, taken exclusively by an explicit manual retry.
//!
//! ```text
//! Pending -> Queued -> Processing -> Sent -> Settled
//!    \          \          \
//!     \          +-> Failed -+-> (retry) -> Queued
//!      +-> Cancelled
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Default payment provider name recorded on new payouts.
pub const DEFAULT_PROVIDER: &str = "dlocal";

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
  Pending,
  Queued,
  Processing,
  Sent,
  Settled,
  Failed,
  Cancelled,
}

impl PayoutStatus {
  /// Whether this status counts against the one-active-payout-per-claim
  /// invariant. `Failed` and `Cancelled` payouts do not block a new one.
  pub fn is_active(self) -> bool {
    !matches!(self, Self::Failed | Self::Cancelled)
  }

  /// Terminal statuses admit no further transitions at all.
  /// `Failed` is not listed: the manual retry edge leads out of it.
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Settled | Self::Cancelled)
  }

  /// The transition-table validator. Every status change in the crate goes
  /// through [`Payout::transition`], which consults this table; callers can
  /// never regress a payout by discipline failure alone.
  pub fn can_transition_to(self, to: Self) -> bool {
    use PayoutStatus::*;
    matches!(
      (self, to),
      (Pending, Queued | Processing | Sent | Settled | Failed | Cancelled)
        | (Queued, Processing | Sent | Settled | Failed | Cancelled)
        | (Processing, Sent | Settled | Failed | Cancelled)
        | (Sent, Settled)
        | (Failed, Queued)
    )
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Queued => "queued",
      Self::Processing => "processing",
      Self::Sent => "sent",
      Self::Settled => "settled",
      Self::Failed => "failed",
      Self::Cancelled => "cancelled",
    }
  }
}

impl fmt::Display for PayoutStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// A persisted payout. Never deleted; the full row history forms the audit
/// trail alongside the webhook event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
  pub id:                    Uuid,
  pub claim_id:              String,
  /// Weak reference to the recipient record — lookup only, no ownership.
  pub recipient_id:          Uuid,
  #[serde(rename = "amountEUR")]
  pub amount_eur:            f64,
  pub currency_destination:  String,
  pub fx_rate:               Option<f64>,
  pub amount_destination:    Option<f64>,
  pub provider:              String,
  pub provider_payout_id:    Option<String>,
  pub status:                PayoutStatus,
  pub failure_reason:        Option<String>,
  pub failure_code:          Option<String>,
  pub created_at:            DateTime<Utc>,
  pub queued_at:             Option<DateTime<Utc>>,
  pub sent_at:               Option<DateTime<Utc>>,
  pub settled_at:            Option<DateTime<Utc>>,
  pub retry_count:           u32,
  pub next_retry_at:         Option<DateTime<Utc>>,
  pub webhook_last_event:    Option<String>,
  pub webhook_last_event_at: Option<DateTime<Utc>>,
}

impl Payout {
  /// Create a new payout in `Queued` state, ready for provider submission.
  pub fn new(
    claim_id: impl Into<String>,
    recipient_id: Uuid,
    amount_eur: f64,
    currency_destination: impl Into<String>,
  ) -> Self {
    let now = Utc::now();
    Self {
      id:                    Uuid::new_v4(),
      claim_id:              claim_id.into(),
      recipient_id,
      amount_eur,
      currency_destination:  currency_destination.into(),
      fx_rate:               None,
      amount_destination:    None,
      provider:              DEFAULT_PROVIDER.to_string(),
      provider_payout_id:    None,
      status:                PayoutStatus::Queued,
      failure_reason:        None,
      failure_code:          None,
      created_at:            now,
      queued_at:             Some(now),
      sent_at:               None,
      settled_at:            None,
      retry_count:           0,
      next_retry_at:         None,
      webhook_last_event:    None,
      webhook_last_event_at: None,
    }
  }

  /// Move to `to`, rejecting anything the transition table forbids.
  pub fn transition(&mut self, to: PayoutStatus) -> Result<()> {
    if !self.status.can_transition_to(to) {
      return Err(Error::IllegalTransition { from: self.status, to });
    }
    self.status = to;
    Ok(())
  }

  /// Provider accepted the submission: `Queued -> Processing`.
  pub fn mark_submitted(&mut self, provider_payout_id: String) -> Result<()> {
    self.transition(PayoutStatus::Processing)?;
    self.provider_payout_id = Some(provider_payout_id);
    self.sent_at = Some(Utc::now());
    Ok(())
  }

  /// Provider rejected the submission (or the call failed outright).
  pub fn mark_submit_failed(&mut self, reason: String) -> Result<()> {
    self.transition(PayoutStatus::Failed)?;
    self.failure_reason = Some(reason);
    Ok(())
  }

  /// Manual retry: `Failed -> Queued`, bumping the retry count and clearing
  /// failure diagnostics. Rejected when the payout is not `Failed` or when
  /// the retry ceiling is reached — at that point the claim needs manual
  /// review, not another automatic attempt.
  pub fn begin_retry(&mut self, max_retries: u32) -> Result<()> {
    if self.status != PayoutStatus::Failed {
      return Err(Error::RetryNotAllowed(self.status));
    }
    if self.retry_count >= max_retries {
      return Err(Error::RetryLimitReached {
        limit:    max_retries,
        attempts: self.retry_count,
      });
    }
    self.transition(PayoutStatus::Queued)?;
    self.retry_count += 1;
    self.queued_at = Some(Utc::now());
    self.failure_reason = None;
    self.failure_code = None;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn queued_payout() -> Payout {
    Payout::new("CLM1", Uuid::new_v4(), 400.0, "EUR")
  }

  #[test]
  fn new_payout_is_queued_with_timestamps() {
    let p = queued_payout();
    assert_eq!(p.status, PayoutStatus::Queued);
    assert!(p.queued_at.is_some());
    assert!(p.sent_at.is_none());
    assert_eq!(p.retry_count, 0);
  }

  #[test]
  fn happy_path_transitions_are_legal() {
    let mut p = queued_payout();
    p.mark_submitted("DLOCAL-1".into()).unwrap();
    assert_eq!(p.status, PayoutStatus::Processing);
    assert!(p.sent_at.is_some());

    p.transition(PayoutStatus::Sent).unwrap();
    p.transition(PayoutStatus::Settled).unwrap();
    assert!(p.status.is_terminal());
  }

  #[test]
  fn settled_admits_no_further_transitions() {
    let mut p = queued_payout();
    p.transition(PayoutStatus::Settled).unwrap();
    for to in [
      PayoutStatus::Queued,
      PayoutStatus::Processing,
      PayoutStatus::Sent,
      PayoutStatus::Failed,
      PayoutStatus::Cancelled,
    ] {
      assert!(matches!(
        p.clone().transition(to),
        Err(Error::IllegalTransition { .. })
      ));
    }
  }

  #[test]
  fn sent_cannot_regress_to_processing() {
    let mut p = queued_payout();
    p.transition(PayoutStatus::Sent).unwrap();
    assert!(p.transition(PayoutStatus::Processing).is_err());
    assert!(p.transition(PayoutStatus::Failed).is_err());
  }

  #[test]
  fn retry_only_from_failed() {
    let mut p = queued_payout();
    p.mark_submit_failed("insufficient provider balance".into()).unwrap();
    assert_eq!(p.status, PayoutStatus::Failed);

    p.begin_retry(5).unwrap();
    assert_eq!(p.status, PayoutStatus::Queued);
    assert_eq!(p.retry_count, 1);
    assert!(p.failure_reason.is_none());
  }

  #[test]
  fn retry_of_sent_payout_is_rejected() {
    let mut p = queued_payout();
    p.transition(PayoutStatus::Sent).unwrap();
    assert!(matches!(
      p.begin_retry(5),
      Err(Error::RetryNotAllowed(PayoutStatus::Sent))
    ));
  }

  #[test]
  fn retry_ceiling_is_enforced() {
    let mut p = queued_payout();
    p.mark_submit_failed("boom".into()).unwrap();
    p.retry_count = 5;
    assert!(matches!(
      p.begin_retry(5),
      Err(Error::RetryLimitReached { limit: 5, attempts: 5 })
    ));
  }

  #[test]
  fn active_statuses_block_new_payouts() {
    assert!(PayoutStatus::Queued.is_active());
    assert!(PayoutStatus::Sent.is_active());
    assert!(!PayoutStatus::Failed.is_active());
    assert!(!PayoutStatus::Cancelled.is_active());
  }
}

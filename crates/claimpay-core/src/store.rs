//! Per-entity store traits.
//!
//! Implemented by storage backends (e.g. `claimpay-store-sqlite`). Higher
//! layers (`claimpay-api`, `claimpay-recon`) depend on these abstractions,
//! not on any concrete backend. A single backend type typically implements
//! all of them with one shared error type, which is what the engine, trigger
//! and ingestor bounds assume.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use uuid::Uuid;

use crate::{
  payout::Payout,
  recipient::Recipient,
  reconciliation::{ReconciliationRecord, ReconciliationStatus},
  webhook::WebhookEventRecord,
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Whether an upsert created a new row or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
  Created,
  Updated,
}

/// Result of the guarded payout insert.
#[derive(Debug, Clone)]
pub enum PayoutCreation {
  /// The payout was inserted; no active payout existed for the claim.
  Created(Payout),
  /// A payout outside `{failed, cancelled}` already exists for the claim;
  /// nothing was written.
  AlreadyActive,
}

// ─── Recipients ──────────────────────────────────────────────────────────────

pub trait RecipientStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert or update the recipient for its claim id.
  ///
  /// At most one recipient exists per claim: when a record for the claim is
  /// already present, its `id` and `created_at` are preserved and the rest
  /// of the row is replaced. Returns the row as persisted.
  fn upsert_recipient(
    &self,
    recipient: Recipient,
  ) -> impl Future<Output = Result<(Recipient, UpsertOutcome), Self::Error>> + Send + '_;

  fn recipient_by_claim<'a>(
    &'a self,
    claim_id: &'a str,
  ) -> impl Future<Output = Result<Option<Recipient>, Self::Error>> + Send + 'a;

  fn recipient_by_id(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Recipient>, Self::Error>> + Send + '_;

  /// Whether a `verified` recipient exists for the claim.
  fn verified_recipient_exists<'a>(
    &'a self,
    claim_id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}

// ─── Payouts ─────────────────────────────────────────────────────────────────

pub trait PayoutStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert `payout` unless an active payout already exists for its claim.
  ///
  /// The existence check and the insert must be atomic with respect to other
  /// creators — this is the sole guard upholding the at-most-one-active-
  /// payout-per-claim invariant under concurrent trigger runs and retries.
  fn create_payout_if_absent(
    &self,
    payout: Payout,
  ) -> impl Future<Output = Result<PayoutCreation, Self::Error>> + Send + '_;

  /// Persist the current state of an existing payout row.
  fn update_payout(
    &self,
    payout: Payout,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn payout_by_id(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Payout>, Self::Error>> + Send + '_;

  /// Most recent payout for a claim, by creation time.
  fn payout_by_claim<'a>(
    &'a self,
    claim_id: &'a str,
  ) -> impl Future<Output = Result<Option<Payout>, Self::Error>> + Send + 'a;

  fn payout_by_provider_id<'a>(
    &'a self,
    provider_payout_id: &'a str,
  ) -> impl Future<Output = Result<Option<Payout>, Self::Error>> + Send + 'a;

  fn active_payout_exists<'a>(
    &'a self,
    claim_id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}

// ─── Reconciliations ─────────────────────────────────────────────────────────

pub trait ReconciliationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert a new record. `bank_ref` is unique; callers deduplicate with
  /// [`Self::reconciliation_exists`] first and the store enforces the
  /// constraint as a backstop.
  fn insert_reconciliation(
    &self,
    record: ReconciliationRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn reconciliation_exists<'a>(
    &'a self,
    bank_ref: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn reconciliation_by_id(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ReconciliationRecord>, Self::Error>> + Send + '_;

  /// All `matched` records with a claim id, oldest received first.
  fn matched_reconciliations(
    &self,
  ) -> impl Future<Output = Result<Vec<ReconciliationRecord>, Self::Error>> + Send + '_;

  /// All `pending_match` records, newest received first (manual-review list).
  fn pending_reconciliations(
    &self,
  ) -> impl Future<Output = Result<Vec<ReconciliationRecord>, Self::Error>> + Send + '_;

  /// Update the status (and optionally the notes) of a record.
  fn set_reconciliation_status(
    &self,
    id: Uuid,
    status: ReconciliationStatus,
    notes: Option<String>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Manually match a `pending_match` record to a claim. Returns `false`
  /// (and writes nothing) when the record is missing or already matched.
  fn manual_match<'a>(
    &'a self,
    id: Uuid,
    claim_id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}

// ─── Webhook event log ───────────────────────────────────────────────────────

pub trait WebhookEventStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Append one processed provider event to the audit log.
  /// The log is never read back by business logic.
  fn log_webhook_event(
    &self,
    event: WebhookEventRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Count logged events for one provider payout id. Every delivery counts,
  /// replays included.
  fn webhook_event_count<'a>(
    &'a self,
    provider_payout_id: &'a str,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + 'a;
}

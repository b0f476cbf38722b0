//! Payout trigger — turns matched reconciliations into payouts once the
//! settlement delay elapses.
//!
//! This is the sole writer permitted to move a reconciliation record out of
//! `matched`. Re-runs are idempotent: a claim that already has an active
//! payout just flips its record to `payout_created`.

use chrono::{Duration, Utc};

use crate::{
  payout::Payout,
  provider::PayoutProvider,
  recipient::{Recipient, RecipientStatus},
  reconciliation::ReconciliationStatus,
  store::{PayoutCreation, PayoutStore, ReconciliationStore, RecipientStore},
};

// ─── Policy and summary ──────────────────────────────────────────────────────

/// How strictly the credited amount must match the claim's expected
/// compensation before a payout is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmountPolicy {
  /// Accept any credited amount (the upstream claims system does not expose
  /// expected amounts yet).
  #[default]
  Any,
  /// Require an exact match. With no expected-amount source available this
  /// is unsatisfiable, so records are skipped loudly instead of paid.
  Strict,
}

#[derive(Debug, Clone, Copy)]
pub struct TriggerPolicy {
  /// Hours to wait after receiving funds before paying out.
  pub payout_delay_hours: i64,
  pub amount_policy:      AmountPolicy,
}

impl Default for TriggerPolicy {
  fn default() -> Self {
    Self {
      payout_delay_hours: 48,
      amount_policy:      AmountPolicy::Any,
    }
  }
}

/// Counts reported by one trigger run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerSummary {
  /// Payouts created and accepted by the provider.
  pub triggered:         u32,
  /// Records still inside the delay window.
  pub waiting:           u32,
  /// Records whose claim already had an active payout.
  pub already_paid:      u32,
  /// Records skipped because no verified recipient exists.
  pub no_recipient:      u32,
  /// Records skipped by a strict amount policy.
  pub amount_unverified: u32,
  /// Payouts created but rejected at submission.
  pub failed:            u32,
}

// ─── Trigger ─────────────────────────────────────────────────────────────────

pub struct PayoutTrigger<'a, S, P> {
  store:    &'a S,
  provider: &'a P,
  policy:   TriggerPolicy,
}

impl<'a, S, P, E> PayoutTrigger<'a, S, P>
where
  S: ReconciliationStore<Error = E> + RecipientStore<Error = E> + PayoutStore<Error = E>,
  P: PayoutProvider,
  E: std::error::Error + Send + Sync + 'static,
{
  pub fn new(store: &'a S, provider: &'a P, policy: TriggerPolicy) -> Self {
    Self { store, provider, policy }
  }

  /// One scheduled run over all matched reconciliations.
  /// Store failures propagate (the run is safe to repeat); provider failures
  /// are recorded per-record and never abort the batch.
  pub async fn run(&self) -> Result<TriggerSummary, E> {
    let mut summary = TriggerSummary::default();
    let delay = Duration::hours(self.policy.payout_delay_hours);
    let now = Utc::now();

    for rec in self.store.matched_reconciliations().await? {
      let Some(claim_id) = rec.matched_claim_id.clone() else {
        continue;
      };

      let payable_from = rec.received_at + delay;
      if now < payable_from {
        let hours_remaining = (payable_from - now).num_minutes() as f64 / 60.0;
        tracing::info!(
          claim_id = %claim_id,
          hours_remaining,
          "settlement delay not elapsed"
        );
        summary.waiting += 1;
        continue;
      }

      if self.store.active_payout_exists(&claim_id).await? {
        tracing::info!(claim_id = %claim_id, "payout already exists, marking record");
        self
          .store
          .set_reconciliation_status(rec.id, ReconciliationStatus::PayoutCreated, None)
          .await?;
        summary.already_paid += 1;
        continue;
      }

      let recipient = match self.store.recipient_by_claim(&claim_id).await? {
        Some(r) if r.status == RecipientStatus::Verified => r,
        _ => {
          tracing::warn!(claim_id = %claim_id, "no verified recipient, cannot pay out");
          summary.no_recipient += 1;
          continue;
        }
      };

      if self.policy.amount_policy == AmountPolicy::Strict {
        tracing::warn!(
          claim_id = %claim_id,
          amount = rec.amount_eur,
          "strict amount verification has no expected-amount source, skipping"
        );
        summary.amount_unverified += 1;
        continue;
      }

      let payout = Payout::new(
        claim_id.clone(),
        recipient.id,
        rec.amount_eur,
        recipient.currency_preferred.clone(),
      );

      let payout = match self.store.create_payout_if_absent(payout).await? {
        PayoutCreation::Created(p) => p,
        PayoutCreation::AlreadyActive => {
          // Lost a race with a concurrent creator; same as already-exists.
          self
            .store
            .set_reconciliation_status(rec.id, ReconciliationStatus::PayoutCreated, None)
            .await?;
          summary.already_paid += 1;
          continue;
        }
      };

      tracing::info!(
        claim_id = %claim_id,
        payout_id = %payout.id,
        amount = rec.amount_eur,
        "creating payout"
      );

      let submitted = submit_payout(self.store, self.provider, &recipient, payout).await?;
      if submitted.status.is_active() {
        self
          .store
          .set_reconciliation_status(
            rec.id,
            ReconciliationStatus::PayoutCreated,
            Some(format!("Payout ID: {}", submitted.id)),
          )
          .await?;
        summary.triggered += 1;
      } else {
        self
          .store
          .set_reconciliation_status(
            rec.id,
            ReconciliationStatus::PayoutFailed,
            submitted.failure_reason.clone(),
          )
          .await?;
        summary.failed += 1;
      }
    }

    Ok(summary)
  }
}

// ─── Submission ──────────────────────────────────────────────────────────────

/// Submit a queued payout to the provider, recording the outcome.
///
/// The payout's own id is the idempotency reference, so a network failure
/// followed by a retry cannot double-pay. Provider errors become a `failed`
/// payout, never a propagated error. Shared by the trigger and the manual
/// retry endpoint.
pub async fn submit_payout<S, P, E>(
  store: &S,
  provider: &P,
  recipient: &Recipient,
  mut payout: Payout,
) -> Result<Payout, E>
where
  S: PayoutStore<Error = E>,
  P: PayoutProvider,
  E: std::error::Error + Send + Sync + 'static,
{
  let reference = payout.id.to_string();
  match provider
    .create_payout(
      recipient,
      payout.amount_eur,
      &payout.currency_destination,
      &reference,
    )
    .await
  {
    Ok(created) => {
      if let Err(e) = payout.mark_submitted(created.provider_id) {
        // Only reachable if the payout was not queued, which submit callers
        // guarantee; record it rather than crash the batch.
        tracing::error!(payout_id = %payout.id, error = %e, "submission bookkeeping failed");
      } else {
        tracing::info!(
          payout_id = %payout.id,
          provider_payout_id = ?payout.provider_payout_id,
          "payout submitted"
        );
      }
    }
    Err(e) => {
      tracing::warn!(payout_id = %payout.id, error = %e, "provider rejected payout submission");
      let _ = payout.mark_submit_failed(e.to_string());
    }
  }

  store.update_payout(payout.clone()).await?;
  Ok(payout)
}

//! Webhook ingestor — maps provider event payloads to payout state-machine
//! transitions, idempotently.
//!
//! Replay safety: applying the same event twice changes nothing beyond the
//! `webhook_last_event` stamp and a second audit-log row. Unknown event types
//! and events for unknown payouts are acknowledged without error so the
//! provider stops retrying.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  payout::{Payout, PayoutStatus},
  provider::Notifier,
  store::{PayoutStore, RecipientStore, WebhookEventStore},
};

// ─── Wire payload ────────────────────────────────────────────────────────────

/// A provider webhook event as delivered to `/webhooks/dlocal`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookPayload {
  #[serde(rename = "type", default)]
  pub event_type: String,
  #[serde(default)]
  pub data:       WebhookData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookData {
  /// The provider's payout id.
  #[serde(default)]
  pub id:            Option<String>,
  /// Our payout id, echoed back from the submission's idempotency reference.
  #[serde(default)]
  pub external_id:   Option<String>,
  #[serde(default)]
  pub status_detail: Option<String>,
  #[serde(default)]
  pub reject_reason: Option<String>,
  /// Providers send this as either a string or a number.
  #[serde(default)]
  pub status_code:   Option<serde_json::Value>,
}

impl WebhookData {
  fn failure_reason(&self) -> Option<String> {
    self
      .status_detail
      .clone()
      .or_else(|| self.reject_reason.clone())
  }

  fn failure_code(&self) -> Option<String> {
    self.status_code.as_ref().map(|v| match v {
      serde_json::Value::String(s) => s.clone(),
      other => other.to_string(),
    })
  }
}

// ─── Audit log record ────────────────────────────────────────────────────────

/// One row of the append-only webhook audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEventRecord {
  pub id:                 Uuid,
  pub event_type:         String,
  pub payout_id:          Option<Uuid>,
  pub provider_payout_id: Option<String>,
  pub payload:            serde_json::Value,
  pub processed_at:       DateTime<Utc>,
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// What processing an event did to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
  /// The payout moved to a new status.
  Transitioned {
    payout_id: Uuid,
    from:      PayoutStatus,
    to:        PayoutStatus,
  },
  /// Known event, but the payout was already at (or past) the target status.
  /// Timestamps are not re-stamped.
  Unchanged { payout_id: Uuid },
  /// Unknown event type; logged, status untouched.
  Ignored { payout_id: Uuid },
  /// No payout matches the event. Acknowledged and discarded — the provider
  /// retries on non-2xx, so this must not be an error.
  UnknownPayout,
}

// ─── Event mapping ───────────────────────────────────────────────────────────

/// Target status for a provider event type, or `None` for unknown types.
/// `payout.cancelled` maps to `Failed` (with the event's reject reason),
/// matching the provider's semantics of a transfer that will never complete.
fn target_status(event_type: &str) -> Option<PayoutStatus> {
  match event_type {
    "payout.pending" | "payout.created" => Some(PayoutStatus::Processing),
    "payout.completed" => Some(PayoutStatus::Sent),
    "payout.paid" => Some(PayoutStatus::Settled),
    "payout.rejected" | "payout.cancelled" | "payout.failed" => {
      Some(PayoutStatus::Failed)
    }
    _ => None,
  }
}

// ─── Ingestor ────────────────────────────────────────────────────────────────

pub struct WebhookIngestor<'a, S, N> {
  store:    &'a S,
  notifier: &'a N,
}

impl<'a, S, N, E> WebhookIngestor<'a, S, N>
where
  S: PayoutStore<Error = E>
    + RecipientStore<Error = E>
    + WebhookEventStore<Error = E>,
  E: std::error::Error + Send + Sync + 'static,
  N: Notifier,
{
  pub fn new(store: &'a S, notifier: &'a N) -> Self {
    Self { store, notifier }
  }

  /// Process one provider event. Store failures propagate; everything else
  /// resolves to a [`WebhookOutcome`].
  pub async fn process(&self, payload: WebhookPayload) -> Result<WebhookOutcome, E> {
    let Some(provider_payout_id) = payload.data.id.clone() else {
      // The API layer rejects these with 400 before we get here; treat a
      // bare payload defensively as an unknown payout.
      return Ok(WebhookOutcome::UnknownPayout);
    };

    // Lookup by provider payout id, falling back to treating the event's
    // external id as our own payout id.
    let mut payout = match self
      .store
      .payout_by_provider_id(&provider_payout_id)
      .await?
    {
      Some(p) => p,
      None => {
        let by_external = match payload
          .data
          .external_id
          .as_deref()
          .and_then(|s| Uuid::parse_str(s).ok())
        {
          Some(id) => self.store.payout_by_id(id).await?,
          None => None,
        };
        match by_external {
          Some(p) => p,
          None => {
            tracing::warn!(
              %provider_payout_id,
              event_type = %payload.event_type,
              "webhook for unknown payout, acknowledging"
            );
            return Ok(WebhookOutcome::UnknownPayout);
          }
        }
      }
    };

    let from = payout.status;
    let outcome = match target_status(&payload.event_type) {
      None => {
        tracing::info!(
          payout_id = %payout.id,
          event_type = %payload.event_type,
          "unknown webhook event type, ignoring"
        );
        WebhookOutcome::Ignored { payout_id: payout.id }
      }
      Some(to) if to == from => WebhookOutcome::Unchanged { payout_id: payout.id },
      Some(to) if !from.can_transition_to(to) => {
        tracing::warn!(
          payout_id = %payout.id,
          %from,
          %to,
          event_type = %payload.event_type,
          "webhook would regress payout status, ignoring"
        );
        WebhookOutcome::Unchanged { payout_id: payout.id }
      }
      Some(to) => {
        // Legal transition checked above; apply and stamp.
        payout.status = to;
        match to {
          PayoutStatus::Sent => payout.sent_at = Some(Utc::now()),
          PayoutStatus::Settled => payout.settled_at = Some(Utc::now()),
          PayoutStatus::Failed => {
            payout.failure_reason = payload.data.failure_reason();
            payout.failure_code = payload.data.failure_code();
          }
          _ => {}
        }
        WebhookOutcome::Transitioned { payout_id: payout.id, from, to }
      }
    };

    // The last-event stamp is updated whether or not the status changed.
    payout.webhook_last_event = Some(payload.event_type.clone());
    payout.webhook_last_event_at = Some(Utc::now());
    self.store.update_payout(payout.clone()).await?;

    self
      .store
      .log_webhook_event(WebhookEventRecord {
        id:                 Uuid::new_v4(),
        event_type:         payload.event_type.clone(),
        payout_id:          Some(payout.id),
        provider_payout_id: Some(provider_payout_id),
        payload:            serde_json::to_value(&payload).unwrap_or_default(),
        processed_at:       Utc::now(),
      })
      .await?;

    if let WebhookOutcome::Transitioned { from, to, .. } = outcome {
      tracing::info!(payout_id = %payout.id, %from, %to, "payout status updated");
      if matches!(
        to,
        PayoutStatus::Sent | PayoutStatus::Settled | PayoutStatus::Failed
      ) {
        self.send_notification(&payout).await;
      }
    }

    Ok(outcome)
  }

  /// Best-effort notification; failures are logged and swallowed.
  async fn send_notification(&self, payout: &Payout) {
    let recipient = match self.store.recipient_by_id(payout.recipient_id).await {
      Ok(Some(r)) => r,
      Ok(None) => {
        tracing::warn!(payout_id = %payout.id, "no recipient for payout, skipping notification");
        return;
      }
      Err(e) => {
        tracing::warn!(payout_id = %payout.id, error = %e, "recipient lookup failed, skipping notification");
        return;
      }
    };

    if let Err(e) = self.notifier.notify(&recipient, payout).await {
      tracing::warn!(payout_id = %payout.id, error = %e, "failed to send payout notification");
    }
  }
}

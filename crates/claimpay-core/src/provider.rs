//! External collaborator seams: the payment provider and the notification
//! channel.
//!
//! Both are consumed as abstract traits so the core never depends on HTTP.
//! `claimpay-dlocal` supplies the production implementations.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{payout::Payout, recipient::Recipient};

/// The provider's view of a created payout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPayout {
  pub provider_id: String,
  pub status:      String,
}

/// Abstraction over the payment provider's payout API.
///
/// `create_payout` must be idempotent keyed on `reference` — the core always
/// passes its own payout id — so a retried submission under network failure
/// cannot double-pay.
pub trait PayoutProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn create_payout<'a>(
    &'a self,
    recipient: &'a Recipient,
    amount_eur: f64,
    currency: &'a str,
    reference: &'a str,
  ) -> impl Future<Output = Result<ProviderPayout, Self::Error>> + Send + 'a;

  fn payout_status<'a>(
    &'a self,
    provider_id: &'a str,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;
}

/// One-way outbound notification channel. Delivery is best-effort: a failed
/// notification never rolls back the state change that triggered it.
pub trait Notifier: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn notify<'a>(
    &'a self,
    recipient: &'a Recipient,
    payout: &'a Payout,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// A notifier that drops everything — used in the reconciliation job (which
/// never reaches a notifying transition) and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
  type Error = std::convert::Infallible;

  async fn notify(&self, _recipient: &Recipient, _payout: &Payout) -> Result<(), Self::Error> {
    Ok(())
  }
}

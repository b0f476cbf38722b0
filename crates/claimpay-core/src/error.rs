//! Error types for `claimpay-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::payout::PayoutStatus;

#[derive(Debug, Error)]
pub enum Error {
  #[error("payout not found: {0}")]
  PayoutNotFound(Uuid),

  #[error("recipient not found for claim {0}")]
  RecipientNotFound(String),

  #[error("illegal payout transition: {from} -> {to}")]
  IllegalTransition {
    from: PayoutStatus,
    to:   PayoutStatus,
  },

  #[error("cannot retry payout with status: {0}")]
  RetryNotAllowed(PayoutStatus),

  #[error("retry limit of {limit} reached after {attempts} attempts")]
  RetryLimitReached { limit: u32, attempts: u32 },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

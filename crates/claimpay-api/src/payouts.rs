//! Handlers for the `/api/payouts` endpoints.

use axum::{
  Json,
  extract::{Path, State},
};
use claimpay_core::{
  payout::Payout,
  provider::PayoutProvider,
  store::{PayoutStore, RecipientStore},
  trigger::submit_payout,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// `GET /api/payouts/claim/{claim_id}`
///
/// Returns the most recent payout for the claim.
pub async fn by_claim<S, P, N, E>(
  State(state): State<AppState<S, P, N>>,
  Path(claim_id): Path<String>,
) -> Result<Json<Payout>, ApiError>
where
  S: PayoutStore<Error = E> + Send + Sync + 'static,
  P: Send + Sync + 'static,
  N: Send + Sync + 'static,
  E: std::error::Error + Send + Sync + 'static,
{
  let payout = state
    .store
    .payout_by_claim(&claim_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound("Payout not found".to_string()))?;
  Ok(Json(payout))
}

/// `GET /api/payouts/{id}`
pub async fn by_id<S, P, N, E>(
  State(state): State<AppState<S, P, N>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Payout>, ApiError>
where
  S: PayoutStore<Error = E> + Send + Sync + 'static,
  P: Send + Sync + 'static,
  N: Send + Sync + 'static,
  E: std::error::Error + Send + Sync + 'static,
{
  let payout = state
    .store
    .payout_by_id(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound("Payout not found".to_string()))?;
  Ok(Json(payout))
}

/// `POST /api/payouts/{id}/retry`
///
/// Manually re-queues a failed payout and immediately resubmits it to the
/// provider. The retry ceiling and the failed-only precondition are enforced
/// by the payout state machine.
pub async fn retry<S, P, N, E>(
  State(state): State<AppState<S, P, N>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Payout>, ApiError>
where
  S: PayoutStore<Error = E> + RecipientStore<Error = E> + Send + Sync + 'static,
  P: PayoutProvider + Send + Sync + 'static,
  N: Send + Sync + 'static,
  E: std::error::Error + Send + Sync + 'static,
{
  let mut payout = state
    .store
    .payout_by_id(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound("Payout not found".to_string()))?;

  payout
    .begin_retry(state.config.max_retries)
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

  let recipient = state
    .store
    .recipient_by_id(payout.recipient_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::BadRequest("Recipient not found".to_string()))?;

  // Persist the queued state before the provider call so a crash mid-retry
  // leaves an accurate ledger.
  state
    .store
    .update_payout(payout.clone())
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  tracing::info!(payout_id = %payout.id, attempt = payout.retry_count, "manual payout retry");

  let submitted =
    submit_payout(&*state.store, &*state.provider, &recipient, payout)
      .await
      .map_err(|e| ApiError::Store(Box::new(e)))?;

  Ok(Json(submitted))
}

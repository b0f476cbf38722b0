//! Handlers for the `/api/recipients` endpoints.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use claimpay_core::{
  recipient::{NewRecipient, Recipient, RecipientStatus},
  store::{RecipientStore, UpsertOutcome},
};

use crate::{AppState, error::ApiError};

/// `POST /api/recipients`
///
/// Upserts the recipient keyed on claim id. A recipient that passes field
/// validation is marked verified; document screening happens upstream in the
/// claims pipeline.
pub async fn create<S, P, N, E>(
  State(state): State<AppState<S, P, N>>,
  Json(input): Json<NewRecipient>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RecipientStore<Error = E> + Send + Sync + 'static,
  P: Send + Sync + 'static,
  N: Send + Sync + 'static,
  E: std::error::Error + Send + Sync + 'static,
{
  let mut recipient = Recipient::new(input);

  let errors = recipient.validate();
  if !errors.is_empty() {
    tracing::warn!(
      claim_id = %recipient.claim_id,
      errors = errors.len(),
      "recipient submission failed validation"
    );
    return Err(ApiError::Validation(errors));
  }
  recipient.status = RecipientStatus::Verified;

  let (saved, outcome) = state
    .store
    .upsert_recipient(recipient)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  tracing::info!(
    claim_id = %saved.claim_id,
    recipient_id = %saved.id,
    outcome = ?outcome,
    "recipient stored"
  );

  let status = match outcome {
    UpsertOutcome::Created => StatusCode::CREATED,
    UpsertOutcome::Updated => StatusCode::OK,
  };
  Ok((status, Json(saved)))
}

/// `GET /api/recipients/claim/{claim_id}`
pub async fn by_claim<S, P, N, E>(
  State(state): State<AppState<S, P, N>>,
  Path(claim_id): Path<String>,
) -> Result<Json<Recipient>, ApiError>
where
  S: RecipientStore<Error = E> + Send + Sync + 'static,
  P: Send + Sync + 'static,
  N: Send + Sync + 'static,
  E: std::error::Error + Send + Sync + 'static,
{
  let recipient = state
    .store
    .recipient_by_claim(&claim_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound("Recipient not found".to_string()))?;
  Ok(Json(recipient))
}

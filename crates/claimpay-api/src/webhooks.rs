//! dLocal webhook intake.
//!
//! Signature verification is optional: when no secret is configured
//! (sandbox, local dev) payloads are accepted as-is.

use axum::{
  Json,
  body::Bytes,
  extract::State,
  http::HeaderMap,
};
use claimpay_core::{
  provider::Notifier,
  store::{PayoutStore, RecipientStore, WebhookEventStore},
  webhook::{WebhookIngestor, WebhookOutcome, WebhookPayload},
};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use crate::{AppState, error::ApiError};

const SIGNATURE_HEADER: &str = "x-dlocal-signature";

/// `POST /webhooks/dlocal`
pub async fn dlocal<S, P, N, E>(
  State(state): State<AppState<S, P, N>>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: PayoutStore<Error = E>
    + RecipientStore<Error = E>
    + WebhookEventStore<Error = E>
    + Send
    + Sync
    + 'static,
  P: Send + Sync + 'static,
  N: Notifier + Send + Sync + 'static,
  E: std::error::Error + Send + Sync + 'static,
{
  if let Some(secret) = state.config.webhook_secret.as_deref() {
    let signature = headers
      .get(SIGNATURE_HEADER)
      .and_then(|v| v.to_str().ok());
    if !signature_is_valid(secret, &body, signature) {
      tracing::warn!("rejected webhook with missing or invalid signature");
      return Err(ApiError::Unauthorized("Invalid signature".to_string()));
    }
  }

  let payload: WebhookPayload = serde_json::from_slice(&body)
    .map_err(|e| ApiError::BadRequest(format!("Invalid JSON payload: {e}")))?;
  if payload.data.id.is_none() {
    return Err(ApiError::BadRequest("Missing payout ID".to_string()));
  }

  tracing::info!(event_type = %payload.event_type, "received dLocal webhook");

  let outcome = WebhookIngestor::new(&*state.store, &*state.notifier)
    .process(payload)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  // Unknown payouts are acknowledged so the provider stops redelivering.
  let status = match outcome {
    WebhookOutcome::UnknownPayout => "ignored",
    _ => "ok",
  };
  Ok(Json(json!({ "status": status })))
}

/// Verify the hex-encoded HMAC-SHA256 of the raw body.
fn signature_is_valid(secret: &str, body: &[u8], signature: Option<&str>) -> bool {
  let Some(signature) = signature else {
    return false;
  };
  let Ok(signature) = hex::decode(signature) else {
    return false;
  };
  let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
    return false;
  };
  mac.update(body);
  mac.verify_slice(&signature).is_ok()
}

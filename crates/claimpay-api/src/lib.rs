//! JSON REST API for the ClaimPay payout ledger.
//!
//! Exposes an axum [`Router`] backed by any store implementing the
//! `claimpay-core` store traits, plus a payment provider and a notifier.
//! TLS and transport concerns are the caller's responsibility.

pub mod error;
pub mod payouts;
pub mod recipients;
pub mod webhooks;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  routing::{get, post},
};
use claimpay_core::{
  provider::{Notifier, PayoutProvider},
  store::{PayoutStore, RecipientStore, WebhookEventStore},
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` or
/// `CLAIMPAY_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:              String,
  #[serde(default = "default_port")]
  pub port:              u16,
  #[serde(default = "default_store_path")]
  pub store_path:        PathBuf,
  #[serde(default = "default_dlocal_base_url")]
  pub dlocal_base_url:   String,
  #[serde(default)]
  pub dlocal_api_key:    String,
  #[serde(default)]
  pub dlocal_secret_key: String,
  #[serde(default = "default_true")]
  pub dlocal_sandbox:    bool,
  /// HMAC secret for webhook signatures. Unset disables verification.
  #[serde(default)]
  pub webhook_secret:    Option<String>,
  #[serde(default = "default_email_endpoint")]
  pub email_endpoint:    String,
  #[serde(default = "default_max_retries")]
  pub max_retries:       u32,
  /// Externally reachable base URL, used as the provider's webhook callback.
  #[serde(default)]
  pub public_base_url:   Option<String>,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("payouts.db") }
fn default_dlocal_base_url() -> String { "https://sandbox.dlocal.com".to_string() }
fn default_true() -> bool { true }
fn default_email_endpoint() -> String {
  "http://localhost:8080/send-email".to_string()
}
fn default_max_retries() -> u32 { 5 }

/// The slice of configuration the handlers need at request time.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub webhook_secret: Option<String>,
  pub max_retries:    u32,
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, P, N> {
  pub store:    Arc<S>,
  pub provider: Arc<P>,
  pub notifier: Arc<N>,
  pub config:   Arc<ApiConfig>,
}

impl<S, P, N> Clone for AppState<S, P, N> {
  fn clone(&self) -> Self {
    Self {
      store:    self.store.clone(),
      provider: self.provider.clone(),
      notifier: self.notifier.clone(),
      config:   self.config.clone(),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised router for the payout API.
pub fn router<S, P, N, E>(state: AppState<S, P, N>) -> Router
where
  S: RecipientStore<Error = E>
    + PayoutStore<Error = E>
    + WebhookEventStore<Error = E>
    + Send
    + Sync
    + 'static,
  P: PayoutProvider + Send + Sync + 'static,
  N: Notifier + Send + Sync + 'static,
  E: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    .route("/health", get(health))
    .route("/api/recipients", post(recipients::create::<S, P, N, E>))
    .route(
      "/api/recipients/claim/{claim_id}",
      get(recipients::by_claim::<S, P, N, E>),
    )
    .route(
      "/api/payouts/claim/{claim_id}",
      get(payouts::by_claim::<S, P, N, E>),
    )
    .route("/api/payouts/{id}", get(payouts::by_id::<S, P, N, E>))
    .route("/api/payouts/{id}/retry", post(payouts::retry::<S, P, N, E>))
    .route("/webhooks/dlocal", post(webhooks::dlocal::<S, P, N, E>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// `GET /health`
async fn health() -> Json<serde_json::Value> {
  Json(json!({ "status": "ok" }))
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use claimpay_core::{
    payout::{Payout, PayoutStatus},
    provider::NoopNotifier,
    store::PayoutCreation,
  };
  use claimpay_dlocal::{DlocalClient, DlocalConfig};
  use claimpay_store_sqlite::SqliteStore;
  use hmac::{Hmac, Mac};
  use sha2::Sha256;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  type TestState = AppState<SqliteStore, DlocalClient, NoopNotifier>;

  async fn make_state(webhook_secret: Option<&str>) -> TestState {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let provider = DlocalClient::new(DlocalConfig {
      base_url:         "https://sandbox.dlocal.com".into(),
      api_key:          String::new(),
      secret_key:       String::new(),
      sandbox:          true,
      notification_url: None,
    })
    .unwrap();

    AppState {
      store:    Arc::new(store),
      provider: Arc::new(provider),
      notifier: Arc::new(NoopNotifier),
      config:   Arc::new(ApiConfig {
        webhook_secret: webhook_secret.map(str::to_owned),
        max_retries:    5,
      }),
    }
  }

  async fn send(
    state: TestState,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
  ) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    let req = builder.body(body).unwrap();
    router(state).oneshot(req).await.unwrap()
  }

  async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn recipient_body(claim_id: &str) -> serde_json::Value {
    json!({
      "claimId": claim_id,
      "customerId": "CUST-1",
      "firstName": "Ana",
      "lastName": "García",
      "email": "ana@example.com",
      "country": "ES",
      "addressStreet": "Calle Mayor 1",
      "addressCity": "Madrid",
      "addressPostal": "28001",
      "documentType": "DNI",
      "documentNumber": "12345678Z",
      "payoutMethod": "bank",
      "iban": "ES9121000418450200051332",
      "accountHolderName": "Ana García"
    })
  }

  /// Seed a verified recipient and a payout already submitted to the
  /// provider, returning the payout.
  async fn seed_submitted_payout(state: &TestState, claim_id: &str) -> Payout {
    let resp = send(
      state.clone(),
      "POST",
      "/api/recipients",
      Some(recipient_body(claim_id)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let recipient = state
      .store
      .recipient_by_claim(claim_id)
      .await
      .unwrap()
      .unwrap();

    let payout = Payout::new(claim_id, recipient.id, 400.0, "EUR");
    let mut payout = match state.store.create_payout_if_absent(payout).await.unwrap() {
      PayoutCreation::Created(p) => p,
      PayoutCreation::AlreadyActive => panic!("should be created"),
    };
    payout
      .mark_submitted(format!("DLOCAL-{claim_id}"))
      .unwrap();
    state.store.update_payout(payout.clone()).await.unwrap();
    payout
  }

  // ── Health ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn health_endpoint_is_open() {
    let resp = send(make_state(None).await, "GET", "/health", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "ok");
  }

  // ── Recipients ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn valid_recipient_is_created_and_verified() {
    let state = make_state(None).await;

    let resp = send(
      state.clone(),
      "POST",
      "/api/recipients",
      Some(recipient_body("CLM-1")),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["claimId"], "CLM-1");
    assert_eq!(body["status"], "verified");
    let first_id = body["id"].as_str().unwrap().to_owned();

    // Resubmission for the same claim updates in place.
    let resp = send(
      state,
      "POST",
      "/api/recipients",
      Some(recipient_body("CLM-1")),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["id"], first_id.as_str());
  }

  #[tokio::test]
  async fn invalid_recipient_returns_the_error_list() {
    let mut body = recipient_body("CLM-2");
    body["iban"] = serde_json::Value::Null;
    body["accountHolderName"] = serde_json::Value::Null;

    let resp = send(make_state(None).await, "POST", "/api/recipients", Some(body)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body = body_json(resp).await;
    assert_eq!(body["error"], "Validation failed");
    let errors = body["errors"].as_array().unwrap();
    assert!(errors.contains(&json!("IBAN is required for bank transfers")));
    assert!(errors.contains(&json!("Account holder name is required")));
  }

  #[tokio::test]
  async fn unknown_recipient_claim_is_404() {
    let resp = send(
      make_state(None).await,
      "GET",
      "/api/recipients/claim/CLM-NONE",
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"], "Recipient not found");
  }

  #[tokio::test]
  async fn recipient_lookup_by_claim() {
    let state = make_state(None).await;
    send(
      state.clone(),
      "POST",
      "/api/recipients",
      Some(recipient_body("CLM-3")),
    )
    .await;

    let resp = send(state, "GET", "/api/recipients/claim/CLM-3", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["email"], "ana@example.com");
  }

  // ── Payouts ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn payout_lookups_by_id_and_claim() {
    let state = make_state(None).await;
    let payout = seed_submitted_payout(&state, "CLM-P1").await;

    let resp = send(
      state.clone(),
      "GET",
      &format!("/api/payouts/{}", payout.id),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["amountEUR"], 400.0);
    assert_eq!(body["status"], "processing");

    let resp = send(state, "GET", "/api/payouts/claim/CLM-P1", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["id"], payout.id.to_string());
  }

  #[tokio::test]
  async fn unknown_payout_is_404() {
    let resp = send(
      make_state(None).await,
      "GET",
      &format!("/api/payouts/{}", Uuid::new_v4()),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"], "Payout not found");
  }

  #[tokio::test]
  async fn retrying_a_failed_payout_resubmits_it() {
    let state = make_state(None).await;
    let mut payout = seed_submitted_payout(&state, "CLM-P2").await;
    payout.status = PayoutStatus::Failed;
    payout.failure_reason = Some("Invalid IBAN".into());
    state.store.update_payout(payout.clone()).await.unwrap();

    let resp = send(
      state.clone(),
      "POST",
      &format!("/api/payouts/{}/retry", payout.id),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // The sandbox provider accepts, so the retry lands in processing.
    let body = body_json(resp).await;
    assert_eq!(body["status"], "processing");
    assert_eq!(body["retryCount"], 1);
    assert!(body["failureReason"].is_null());
  }

  #[tokio::test]
  async fn retrying_a_non_failed_payout_is_rejected() {
    let state = make_state(None).await;
    let payout = seed_submitted_payout(&state, "CLM-P3").await;

    let resp = send(
      state,
      "POST",
      &format!("/api/payouts/{}/retry", payout.id),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert!(
      body["error"]
        .as_str()
        .unwrap()
        .contains("cannot retry payout with status")
    );
  }

  #[tokio::test]
  async fn retry_ceiling_is_enforced_over_http() {
    let state = make_state(None).await;
    let mut payout = seed_submitted_payout(&state, "CLM-P4").await;
    payout.status = PayoutStatus::Failed;
    payout.retry_count = 5;
    state.store.update_payout(payout.clone()).await.unwrap();

    let resp = send(
      state,
      "POST",
      &format!("/api/payouts/{}/retry", payout.id),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(
      body_json(resp).await["error"]
        .as_str()
        .unwrap()
        .contains("retry limit")
    );
  }

  // ── Webhooks ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn webhook_without_payout_id_is_400() {
    let resp = send(
      make_state(None).await,
      "POST",
      "/webhooks/dlocal",
      Some(json!({ "type": "payout.completed", "data": {} })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "Missing payout ID");
  }

  #[tokio::test]
  async fn webhook_for_unknown_payout_is_acknowledged_as_ignored() {
    let resp = send(
      make_state(None).await,
      "POST",
      "/webhooks/dlocal",
      Some(json!({
        "type": "payout.completed",
        "data": { "id": "DLOCAL-NOBODY" }
      })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "ignored");
  }

  #[tokio::test]
  async fn webhook_transitions_the_payout() {
    let state = make_state(None).await;
    let payout = seed_submitted_payout(&state, "CLM-W1").await;

    let resp = send(
      state.clone(),
      "POST",
      "/webhooks/dlocal",
      Some(json!({
        "type": "payout.completed",
        "data": { "id": "DLOCAL-CLM-W1" }
      })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "ok");

    let fetched = state.store.payout_by_id(payout.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, PayoutStatus::Sent);
  }

  #[tokio::test]
  async fn signed_webhooks_require_a_valid_signature() {
    let state = make_state(Some("topsecret")).await;
    seed_submitted_payout(&state, "CLM-W2").await;

    let payload = json!({
      "type": "payout.completed",
      "data": { "id": "DLOCAL-CLM-W2" }
    })
    .to_string();

    // No signature header.
    let req = Request::builder()
      .method("POST")
      .uri("/webhooks/dlocal")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(payload.clone()))
      .unwrap();
    let resp = router(state.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Wrong signature.
    let req = Request::builder()
      .method("POST")
      .uri("/webhooks/dlocal")
      .header(header::CONTENT_TYPE, "application/json")
      .header("x-dlocal-signature", "deadbeef")
      .body(Body::from(payload.clone()))
      .unwrap();
    let resp = router(state.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Correct signature.
    let mut mac = Hmac::<Sha256>::new_from_slice(b"topsecret").unwrap();
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    let req = Request::builder()
      .method("POST")
      .uri("/webhooks/dlocal")
      .header(header::CONTENT_TYPE, "application/json")
      .header("x-dlocal-signature", signature)
      .body(Body::from(payload))
      .unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }
}

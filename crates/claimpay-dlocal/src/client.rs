//! Async HTTP client for the dLocal Payouts API.

use std::time::Duration;

use claimpay_core::{
  provider::{PayoutProvider, ProviderPayout},
  recipient::{PayoutMethod, Recipient},
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

// ─── Config ──────────────────────────────────────────────────────────────────

/// Connection settings for the dLocal Payouts API.
#[derive(Debug, Clone)]
pub struct DlocalConfig {
  pub base_url:         String,
  pub api_key:          String,
  pub secret_key:       String,
  /// When set, submissions are simulated locally instead of hitting the API.
  pub sandbox:          bool,
  /// Webhook callback URL passed along with each submission.
  pub notification_url: Option<String>,
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Address<'a> {
  street:   &'a str,
  city:     &'a str,
  zip_code: &'a str,
  country:  &'a str,
}

#[derive(Debug, Serialize)]
struct BankAccount<'a> {
  iban:           Option<&'a str>,
  swift_code:     Option<&'a str>,
  account_holder: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Beneficiary<'a> {
  name:          String,
  document_id:   &'a str,
  document_type: &'static str,
  email:         &'a str,
  address:       Address<'a>,
  #[serde(skip_serializing_if = "Option::is_none")]
  bank_account:  Option<BankAccount<'a>>,
}

#[derive(Debug, Serialize)]
struct CreatePayoutRequest<'a> {
  amount:           f64,
  currency:         &'a str,
  country:          &'a str,
  beneficiary:      Beneficiary<'a>,
  payout_method_id: &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  notification_url: Option<&'a str>,
  external_id:      &'a str,
}

#[derive(Debug, Deserialize)]
struct PayoutResponse {
  id:     String,
  status: String,
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Async client for the dLocal Payouts API.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct DlocalClient {
  client: reqwest::Client,
  config: DlocalConfig,
}

impl DlocalClient {
  pub fn new(config: DlocalConfig) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{path}", self.config.base_url.trim_end_matches('/'))
  }

  fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    req
      .header("X-Login", &self.config.api_key)
      .header("X-Trans-Key", &self.config.secret_key)
  }

  fn build_request<'a>(
    &'a self,
    recipient: &'a Recipient,
    amount_eur: f64,
    currency: &'a str,
    reference: &'a str,
  ) -> CreatePayoutRequest<'a> {
    let bank_account = match recipient.payout_method {
      PayoutMethod::Bank => Some(BankAccount {
        iban:           recipient.iban.as_deref(),
        swift_code:     recipient.bic.as_deref(),
        account_holder: recipient.account_holder_name.as_deref(),
      }),
      PayoutMethod::Card => None,
    };

    CreatePayoutRequest {
      amount:           amount_eur,
      currency,
      country:          &recipient.country,
      beneficiary:      Beneficiary {
        name:          recipient.full_name(),
        document_id:   &recipient.document_number,
        document_type: map_document_type(&recipient.document_type),
        email:         &recipient.email,
        address:       Address {
          street:   &recipient.address_street,
          city:     &recipient.address_city,
          zip_code: &recipient.address_postal,
          country:  &recipient.country,
        },
        bank_account,
      },
      payout_method_id: "BT",
      notification_url: self.config.notification_url.as_deref(),
      external_id:      reference,
    }
  }
}

impl PayoutProvider for DlocalClient {
  type Error = Error;

  async fn create_payout(
    &self,
    recipient: &Recipient,
    amount_eur: f64,
    currency: &str,
    reference: &str,
  ) -> Result<ProviderPayout> {
    tracing::info!(%reference, amount_eur, "creating dLocal payout");

    if self.config.sandbox {
      let payout = simulate_payout(reference);
      tracing::info!(provider_id = %payout.provider_id, "sandbox payout simulated");
      return Ok(payout);
    }

    let request = self.build_request(recipient, amount_eur, currency, reference);
    let resp = self
      .authed(self.client.post(self.url("/payouts")))
      .json(&request)
      .send()
      .await?;

    if !resp.status().is_success() {
      let status = resp.status().as_u16();
      let message = resp.text().await.unwrap_or_default();
      return Err(Error::Api { status, message });
    }

    let payout: PayoutResponse = resp.json().await?;
    Ok(ProviderPayout {
      provider_id: payout.id,
      status:      payout.status,
    })
  }

  async fn payout_status(&self, provider_id: &str) -> Result<String> {
    if self.config.sandbox {
      return Ok("PENDING".to_string());
    }

    let resp = self
      .authed(self.client.get(self.url(&format!("/payouts/{provider_id}"))))
      .send()
      .await?;

    if !resp.status().is_success() {
      let status = resp.status().as_u16();
      let message = resp.text().await.unwrap_or_default();
      return Err(Error::Api { status, message });
    }

    let payout: PayoutResponse = resp.json().await?;
    Ok(payout.status)
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Map our document type labels to dLocal's codes.
fn map_document_type(doc_type: &str) -> &'static str {
  match doc_type {
    "DNI" => "DNI",
    "Passport" => "PASSPORT",
    "NIE" => "NIE",
    "Driver's License" => "DL",
    _ => "OTHER",
  }
}

/// Sandbox submission result. The id is a digest of the idempotency
/// reference, so a retried sandbox submission yields the same provider id
/// instead of a fresh payout.
fn simulate_payout(reference: &str) -> ProviderPayout {
  let digest = Sha256::digest(reference.as_bytes());
  ProviderPayout {
    provider_id: format!("DLOCAL-{}", hex::encode_upper(&digest[..4])),
    status:      "PENDING".to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn document_types_map_to_dlocal_codes() {
    assert_eq!(map_document_type("DNI"), "DNI");
    assert_eq!(map_document_type("Passport"), "PASSPORT");
    assert_eq!(map_document_type("NIE"), "NIE");
    assert_eq!(map_document_type("Driver's License"), "DL");
    assert_eq!(map_document_type("Residence Permit"), "OTHER");
  }

  #[test]
  fn sandbox_ids_are_deterministic_per_reference() {
    let a = simulate_payout("9d3f2c8e-0000-0000-0000-000000000000");
    let b = simulate_payout("9d3f2c8e-0000-0000-0000-000000000000");
    let c = simulate_payout("other-reference");

    assert_eq!(a.provider_id, b.provider_id);
    assert_ne!(a.provider_id, c.provider_id);
    assert!(a.provider_id.starts_with("DLOCAL-"));
    assert_eq!(a.provider_id.len(), "DLOCAL-".len() + 8);
    assert_eq!(a.status, "PENDING");
  }

  #[test]
  fn card_payouts_omit_the_bank_account_block() {
    use claimpay_core::recipient::{NewRecipient, Recipient};

    let recipient = Recipient::new(NewRecipient {
      claim_id:             "CLM-1".into(),
      customer_id:          "CUST-1".into(),
      first_name:           "Ana".into(),
      last_name:            "García".into(),
      email:                "ana@example.com".into(),
      phone:                None,
      country:              "ES".into(),
      address_street:       "Calle Mayor 1".into(),
      address_city:         "Madrid".into(),
      address_postal:       "28001".into(),
      date_of_birth:        None,
      document_type:        "Passport".into(),
      document_number:      "X1234567".into(),
      payout_method:        PayoutMethod::Card,
      iban:                 None,
      bic:                  None,
      account_holder_name:  None,
      bank_name:            None,
      card_token:           Some("tok_abc".into()),
      card_last4:           Some("4242".into()),
      card_brand:           Some("visa".into()),
      currency_preferred:   "EUR".into(),
      kyc_screening_result: None,
    });

    let client = DlocalClient::new(DlocalConfig {
      base_url:         "https://sandbox.dlocal.com".into(),
      api_key:          String::new(),
      secret_key:       String::new(),
      sandbox:          true,
      notification_url: None,
    })
    .unwrap();

    let request = client.build_request(&recipient, 400.0, "EUR", "REF-1");
    let json = serde_json::to_value(&request).unwrap();

    assert_eq!(json["beneficiary"]["name"], "Ana García");
    assert_eq!(json["beneficiary"]["document_type"], "PASSPORT");
    assert!(json["beneficiary"].get("bank_account").is_none());
    assert_eq!(json["payout_method_id"], "BT");
    assert_eq!(json["external_id"], "REF-1");
  }
}

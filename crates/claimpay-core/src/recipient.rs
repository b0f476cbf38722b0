//! Recipient — the payout details a claimant submits for one claim.
//!
//! There is at most one recipient per claim id. Submissions for an existing
//! claim update the record in place, preserving the original id and creation
//! time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the claimant wants to be paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutMethod {
  #[default]
  Bank,
  Card,
}

/// Verification state of a recipient record.
///
/// `Verified` is only set after field-level validation passes. The KYC verdict
/// is an opaque upstream input and does not gate this status here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientStatus {
  #[default]
  Pending,
  Verified,
  Rejected,
}

/// Submission payload for a recipient, as received over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecipient {
  pub claim_id:             String,
  pub customer_id:          String,
  pub first_name:           String,
  pub last_name:            String,
  pub email:                String,
  #[serde(default)]
  pub phone:                Option<String>,
  pub country:              String,
  pub address_street:       String,
  pub address_city:         String,
  pub address_postal:       String,
  #[serde(default)]
  pub date_of_birth:        Option<String>,
  pub document_type:        String,
  pub document_number:      String,
  #[serde(default)]
  pub payout_method:        PayoutMethod,
  #[serde(default)]
  pub iban:                 Option<String>,
  #[serde(default)]
  pub bic:                  Option<String>,
  #[serde(default)]
  pub account_holder_name:  Option<String>,
  #[serde(default)]
  pub bank_name:            Option<String>,
  #[serde(default)]
  pub card_token:           Option<String>,
  #[serde(default)]
  pub card_last4:           Option<String>,
  #[serde(default)]
  pub card_brand:           Option<String>,
  #[serde(default = "default_currency")]
  pub currency_preferred:   String,
  #[serde(default)]
  pub kyc_screening_result: Option<String>,
}

fn default_currency() -> String { "EUR".to_string() }

/// A persisted recipient record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
  pub id:                   Uuid,
  pub claim_id:             String,
  pub customer_id:          String,
  pub first_name:           String,
  pub last_name:            String,
  pub email:                String,
  pub phone:                Option<String>,
  pub country:              String,
  pub address_street:       String,
  pub address_city:         String,
  pub address_postal:       String,
  pub date_of_birth:        Option<String>,
  pub document_type:        String,
  pub document_number:      String,
  pub payout_method:        PayoutMethod,
  pub iban:                 Option<String>,
  pub bic:                  Option<String>,
  pub account_holder_name:  Option<String>,
  pub bank_name:            Option<String>,
  pub card_token:           Option<String>,
  pub card_last4:           Option<String>,
  pub card_brand:           Option<String>,
  pub currency_preferred:   String,
  pub status:               RecipientStatus,
  pub validation_errors:    Option<Vec<String>>,
  pub kyc_screening_result: Option<String>,
  pub created_at:           DateTime<Utc>,
  pub updated_at:           DateTime<Utc>,
}

impl Recipient {
  /// Build a fresh record from a submission. Status starts as `Pending`;
  /// the caller promotes it to `Verified` once validation passes.
  pub fn new(input: NewRecipient) -> Self {
    let now = Utc::now();
    Self {
      id:                   Uuid::new_v4(),
      claim_id:             input.claim_id,
      customer_id:          input.customer_id,
      first_name:           input.first_name,
      last_name:            input.last_name,
      email:                input.email,
      phone:                input.phone,
      country:              input.country,
      address_street:       input.address_street,
      address_city:         input.address_city,
      address_postal:       input.address_postal,
      date_of_birth:        input.date_of_birth,
      document_type:        input.document_type,
      document_number:      input.document_number,
      payout_method:        input.payout_method,
      iban:                 input.iban,
      bic:                  input.bic,
      account_holder_name:  input.account_holder_name,
      bank_name:            input.bank_name,
      card_token:           input.card_token,
      card_last4:           input.card_last4,
      card_brand:           input.card_brand,
      currency_preferred:   input.currency_preferred,
      status:               RecipientStatus::Pending,
      validation_errors:    None,
      kyc_screening_result: input.kyc_screening_result,
      created_at:           now,
      updated_at:           now,
    }
  }

  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }

  /// Field-level validation. Returns an empty list iff the record has every
  /// field its payout method requires.
  pub fn validate(&self) -> Vec<String> {
    let mut errors = Vec::new();

    let required: [(&str, &str); 8] = [
      (&self.first_name, "First name is required"),
      (&self.last_name, "Last name is required"),
      (&self.email, "Email is required"),
      (&self.country, "Country is required"),
      (&self.address_street, "Street address is required"),
      (&self.address_city, "City is required"),
      (&self.address_postal, "Postal code is required"),
      (&self.document_number, "Document number is required"),
    ];
    for (value, message) in required {
      if value.trim().is_empty() {
        errors.push(message.to_string());
      }
    }

    match self.payout_method {
      PayoutMethod::Bank => {
        if self.iban.as_deref().is_none_or(|s| s.trim().is_empty()) {
          errors.push("IBAN is required for bank transfers".to_string());
        }
        if self
          .account_holder_name
          .as_deref()
          .is_none_or(|s| s.trim().is_empty())
        {
          errors.push("Account holder name is required".to_string());
        }
      }
      PayoutMethod::Card => {
        if self.card_token.as_deref().is_none_or(|s| s.trim().is_empty()) {
          errors.push("Card token is required".to_string());
        }
      }
    }

    errors
  }
}

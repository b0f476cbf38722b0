//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Validation errors and
//! webhook payloads are stored as compact JSON. UUIDs are stored as
//! hyphenated lowercase strings. Status and method enums use the same
//! lowercase strings as the JSON wire format.

use chrono::{DateTime, Utc};
use claimpay_core::{
  payout::{Payout, PayoutStatus},
  recipient::{PayoutMethod, Recipient, RecipientStatus},
  reconciliation::{ReconciliationRecord, ReconciliationStatus},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_opt_dt(dt: Option<DateTime<Utc>>) -> Option<String> {
  dt.map(encode_dt)
}

pub fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── PayoutStatus ────────────────────────────────────────────────────────────

pub fn encode_payout_status(s: PayoutStatus) -> &'static str { s.as_str() }

pub fn decode_payout_status(s: &str) -> Result<PayoutStatus> {
  match s {
    "pending" => Ok(PayoutStatus::Pending),
    "queued" => Ok(PayoutStatus::Queued),
    "processing" => Ok(PayoutStatus::Processing),
    "sent" => Ok(PayoutStatus::Sent),
    "settled" => Ok(PayoutStatus::Settled),
    "failed" => Ok(PayoutStatus::Failed),
    "cancelled" => Ok(PayoutStatus::Cancelled),
    other => Err(Error::Decode(format!("unknown payout status: {other:?}"))),
  }
}

// ─── RecipientStatus ─────────────────────────────────────────────────────────

pub fn encode_recipient_status(s: RecipientStatus) -> &'static str {
  match s {
    RecipientStatus::Pending => "pending",
    RecipientStatus::Verified => "verified",
    RecipientStatus::Rejected => "rejected",
  }
}

pub fn decode_recipient_status(s: &str) -> Result<RecipientStatus> {
  match s {
    "pending" => Ok(RecipientStatus::Pending),
    "verified" => Ok(RecipientStatus::Verified),
    "rejected" => Ok(RecipientStatus::Rejected),
    other => Err(Error::Decode(format!("unknown recipient status: {other:?}"))),
  }
}

// ─── PayoutMethod ────────────────────────────────────────────────────────────

pub fn encode_payout_method(m: PayoutMethod) -> &'static str {
  match m {
    PayoutMethod::Bank => "bank",
    PayoutMethod::Card => "card",
  }
}

pub fn decode_payout_method(s: &str) -> Result<PayoutMethod> {
  match s {
    "bank" => Ok(PayoutMethod::Bank),
    "card" => Ok(PayoutMethod::Card),
    other => Err(Error::Decode(format!("unknown payout method: {other:?}"))),
  }
}

// ─── ReconciliationStatus ────────────────────────────────────────────────────

pub fn encode_reconciliation_status(s: ReconciliationStatus) -> &'static str {
  s.as_str()
}

pub fn decode_reconciliation_status(s: &str) -> Result<ReconciliationStatus> {
  match s {
    "pending_match" => Ok(ReconciliationStatus::PendingMatch),
    "matched" => Ok(ReconciliationStatus::Matched),
    "payout_created" => Ok(ReconciliationStatus::PayoutCreated),
    "payout_failed" => Ok(ReconciliationStatus::PayoutFailed),
    other => Err(Error::Decode(format!(
      "unknown reconciliation status: {other:?}"
    ))),
  }
}

// ─── Validation errors ───────────────────────────────────────────────────────

pub fn encode_validation_errors(errors: Option<&Vec<String>>) -> Result<Option<String>> {
  errors.map(|e| serde_json::to_string(e)).transpose().map_err(Error::Json)
}

pub fn decode_validation_errors(s: Option<&str>) -> Result<Option<Vec<String>>> {
  s.map(serde_json::from_str).transpose().map_err(Error::Json)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `recipients` row.
pub struct RawRecipient {
  pub id:                   String,
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
  pub payout_method:        String,
  pub iban:                 Option<String>,
  pub bic:                  Option<String>,
  pub account_holder_name:  Option<String>,
  pub bank_name:            Option<String>,
  pub card_token:           Option<String>,
  pub card_last4:           Option<String>,
  pub card_brand:           Option<String>,
  pub currency_preferred:   String,
  pub status:               String,
  pub validation_errors:    Option<String>,
  pub kyc_screening_result: Option<String>,
  pub created_at:           String,
  pub updated_at:           String,
}

/// Column list matching [`RawRecipient::from_row`] field order.
pub const RECIPIENT_COLUMNS: &str = "id, claim_id, customer_id, first_name, \
   last_name, email, phone, country, address_street, address_city, \
   address_postal, date_of_birth, document_type, document_number, \
   payout_method, iban, bic, account_holder_name, bank_name, card_token, \
   card_last4, card_brand, currency_preferred, status, validation_errors, \
   kyc_screening_result, created_at, updated_at";

impl RawRecipient {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                   row.get(0)?,
      claim_id:             row.get(1)?,
      customer_id:          row.get(2)?,
      first_name:           row.get(3)?,
      last_name:            row.get(4)?,
      email:                row.get(5)?,
      phone:                row.get(6)?,
      country:              row.get(7)?,
      address_street:       row.get(8)?,
      address_city:         row.get(9)?,
      address_postal:       row.get(10)?,
      date_of_birth:        row.get(11)?,
      document_type:        row.get(12)?,
      document_number:      row.get(13)?,
      payout_method:        row.get(14)?,
      iban:                 row.get(15)?,
      bic:                  row.get(16)?,
      account_holder_name:  row.get(17)?,
      bank_name:            row.get(18)?,
      card_token:           row.get(19)?,
      card_last4:           row.get(20)?,
      card_brand:           row.get(21)?,
      currency_preferred:   row.get(22)?,
      status:               row.get(23)?,
      validation_errors:    row.get(24)?,
      kyc_screening_result: row.get(25)?,
      created_at:           row.get(26)?,
      updated_at:           row.get(27)?,
    })
  }

  pub fn into_recipient(self) -> Result<Recipient> {
    Ok(Recipient {
      id:                   decode_uuid(&self.id)?,
      claim_id:             self.claim_id,
      customer_id:          self.customer_id,
      first_name:           self.first_name,
      last_name:            self.last_name,
      email:                self.email,
      phone:                self.phone,
      country:              self.country,
      address_street:       self.address_street,
      address_city:         self.address_city,
      address_postal:       self.address_postal,
      date_of_birth:        self.date_of_birth,
      document_type:        self.document_type,
      document_number:      self.document_number,
      payout_method:        decode_payout_method(&self.payout_method)?,
      iban:                 self.iban,
      bic:                  self.bic,
      account_holder_name:  self.account_holder_name,
      bank_name:            self.bank_name,
      card_token:           self.card_token,
      card_last4:           self.card_last4,
      card_brand:           self.card_brand,
      currency_preferred:   self.currency_preferred,
      status:               decode_recipient_status(&self.status)?,
      validation_errors:    decode_validation_errors(self.validation_errors.as_deref())?,
      kyc_screening_result: self.kyc_screening_result,
      created_at:           decode_dt(&self.created_at)?,
      updated_at:           decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `payouts` row.
pub struct RawPayout {
  pub id:                    String,
  pub claim_id:              String,
  pub recipient_id:          String,
  pub amount_eur:            f64,
  pub currency_destination:  String,
  pub fx_rate:               Option<f64>,
  pub amount_destination:    Option<f64>,
  pub provider:              String,
  pub provider_payout_id:    Option<String>,
  pub status:                String,
  pub failure_reason:        Option<String>,
  pub failure_code:          Option<String>,
  pub created_at:            String,
  pub queued_at:             Option<String>,
  pub sent_at:               Option<String>,
  pub settled_at:            Option<String>,
  pub retry_count:           u32,
  pub next_retry_at:         Option<String>,
  pub webhook_last_event:    Option<String>,
  pub webhook_last_event_at: Option<String>,
}

/// Column list matching [`RawPayout::from_row`] field order.
pub const PAYOUT_COLUMNS: &str = "id, claim_id, recipient_id, amount_eur, \
   currency_destination, fx_rate, amount_destination, provider, \
   provider_payout_id, status, failure_reason, failure_code, created_at, \
   queued_at, sent_at, settled_at, retry_count, next_retry_at, \
   webhook_last_event, webhook_last_event_at";

impl RawPayout {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                    row.get(0)?,
      claim_id:              row.get(1)?,
      recipient_id:          row.get(2)?,
      amount_eur:            row.get(3)?,
      currency_destination:  row.get(4)?,
      fx_rate:               row.get(5)?,
      amount_destination:    row.get(6)?,
      provider:              row.get(7)?,
      provider_payout_id:    row.get(8)?,
      status:                row.get(9)?,
      failure_reason:        row.get(10)?,
      failure_code:          row.get(11)?,
      created_at:            row.get(12)?,
      queued_at:             row.get(13)?,
      sent_at:               row.get(14)?,
      settled_at:            row.get(15)?,
      retry_count:           row.get(16)?,
      next_retry_at:         row.get(17)?,
      webhook_last_event:    row.get(18)?,
      webhook_last_event_at: row.get(19)?,
    })
  }

  pub fn into_payout(self) -> Result<Payout> {
    Ok(Payout {
      id:                    decode_uuid(&self.id)?,
      claim_id:              self.claim_id,
      recipient_id:          decode_uuid(&self.recipient_id)?,
      amount_eur:            self.amount_eur,
      currency_destination:  self.currency_destination,
      fx_rate:               self.fx_rate,
      amount_destination:    self.amount_destination,
      provider:              self.provider,
      provider_payout_id:    self.provider_payout_id,
      status:                decode_payout_status(&self.status)?,
      failure_reason:        self.failure_reason,
      failure_code:          self.failure_code,
      created_at:            decode_dt(&self.created_at)?,
      queued_at:             decode_opt_dt(self.queued_at.as_deref())?,
      sent_at:               decode_opt_dt(self.sent_at.as_deref())?,
      settled_at:            decode_opt_dt(self.settled_at.as_deref())?,
      retry_count:           self.retry_count,
      next_retry_at:         decode_opt_dt(self.next_retry_at.as_deref())?,
      webhook_last_event:    self.webhook_last_event,
      webhook_last_event_at: decode_opt_dt(self.webhook_last_event_at.as_deref())?,
    })
  }
}

/// Raw strings read directly from a `bank_reconciliations` row.
pub struct RawReconciliation {
  pub id:               String,
  pub bank_ref:         String,
  pub amount_eur:       f64,
  pub received_at:      String,
  pub matched_claim_id: Option<String>,
  pub matched_at:       Option<String>,
  pub status:           String,
  pub notes:            Option<String>,
  pub created_at:       String,
}

/// Column list matching [`RawReconciliation::from_row`] field order.
pub const RECONCILIATION_COLUMNS: &str = "id, bank_ref, amount_eur, \
   received_at, matched_claim_id, matched_at, status, notes, created_at";

impl RawReconciliation {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:               row.get(0)?,
      bank_ref:         row.get(1)?,
      amount_eur:       row.get(2)?,
      received_at:      row.get(3)?,
      matched_claim_id: row.get(4)?,
      matched_at:       row.get(5)?,
      status:           row.get(6)?,
      notes:            row.get(7)?,
      created_at:       row.get(8)?,
    })
  }

  pub fn into_record(self) -> Result<ReconciliationRecord> {
    Ok(ReconciliationRecord {
      id:               decode_uuid(&self.id)?,
      bank_ref:         self.bank_ref,
      amount_eur:       self.amount_eur,
      received_at:      decode_dt(&self.received_at)?,
      matched_claim_id: self.matched_claim_id,
      matched_at:       decode_opt_dt(self.matched_at.as_deref())?,
      status:           decode_reconciliation_status(&self.status)?,
      notes:            self.notes,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}

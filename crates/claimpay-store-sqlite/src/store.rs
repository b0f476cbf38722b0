//! [`SqliteStore`] — the SQLite implementation of the per-entity store traits.

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use claimpay_core::{
  payout::Payout,
  recipient::Recipient,
  reconciliation::{ReconciliationRecord, ReconciliationStatus},
  store::{
    PayoutCreation, PayoutStore, RecipientStore, ReconciliationStore,
    UpsertOutcome, WebhookEventStore,
  },
  webhook::WebhookEventRecord,
};

use crate::{
  encode::{
    decode_dt, encode_dt, encode_opt_dt, encode_payout_method, encode_payout_status,
    encode_recipient_status, encode_reconciliation_status, encode_uuid,
    encode_validation_errors, RawPayout, RawReconciliation, RawRecipient,
    PAYOUT_COLUMNS, RECIPIENT_COLUMNS, RECONCILIATION_COLUMNS,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A ClaimPay ledger store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All
/// statements run serialized on the connection's worker thread, so a
/// check-then-insert inside one `call` closure cannot interleave with
/// another writer on the same store.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── RecipientStore impl ─────────────────────────────────────────────────────

impl RecipientStore for SqliteStore {
  type Error = Error;

  async fn upsert_recipient(
    &self,
    recipient: Recipient,
  ) -> Result<(Recipient, UpsertOutcome)> {
    let mut persisted = recipient.clone();
    persisted.updated_at = Utc::now();

    let validation_errors_str =
      encode_validation_errors(persisted.validation_errors.as_ref())?;
    let new_id_str      = encode_uuid(persisted.id);
    let new_created_str = encode_dt(persisted.created_at);
    let updated_str     = encode_dt(persisted.updated_at);
    let method_str      = encode_payout_method(persisted.payout_method).to_owned();
    let status_str      = encode_recipient_status(persisted.status).to_owned();
    let row             = persisted.clone();

    let (id_str, created_str, outcome) = self
      .conn
      .call(move |conn| {
        // Any prior row for the claim keeps its identity and creation time.
        let existing: Option<(String, String)> = conn
          .query_row(
            "SELECT id, created_at FROM recipients WHERE claim_id = ?1",
            rusqlite::params![row.claim_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;

        let (id_str, created_str, outcome) = match existing {
          Some((id, created)) => (id, created, UpsertOutcome::Updated),
          None => (new_id_str, new_created_str, UpsertOutcome::Created),
        };

        conn.execute(
          "INSERT OR REPLACE INTO recipients (
             id, claim_id, customer_id, first_name, last_name, email, phone,
             country, address_street, address_city, address_postal,
             date_of_birth, document_type, document_number, payout_method,
             iban, bic, account_holder_name, bank_name, card_token,
             card_last4, card_brand, currency_preferred, status,
             validation_errors, kyc_screening_result, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                     ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24,
                     ?25, ?26, ?27, ?28)",
          rusqlite::params![
            id_str,
            row.claim_id,
            row.customer_id,
            row.first_name,
            row.last_name,
            row.email,
            row.phone,
            row.country,
            row.address_street,
            row.address_city,
            row.address_postal,
            row.date_of_birth,
            row.document_type,
            row.document_number,
            method_str,
            row.iban,
            row.bic,
            row.account_holder_name,
            row.bank_name,
            row.card_token,
            row.card_last4,
            row.card_brand,
            row.currency_preferred,
            status_str,
            validation_errors_str,
            row.kyc_screening_result,
            created_str,
            updated_str,
          ],
        )?;

        Ok((id_str, created_str, outcome))
      })
      .await?;

    persisted.id = Uuid::parse_str(&id_str)?;
    persisted.created_at = decode_dt(&created_str)?;
    Ok((persisted, outcome))
  }

  async fn recipient_by_claim<'a>(
    &'a self,
    claim_id: &'a str,
  ) -> Result<Option<Recipient>> {
    let claim = claim_id.to_owned();

    let raw: Option<RawRecipient> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {RECIPIENT_COLUMNS} FROM recipients WHERE claim_id = ?1"),
            rusqlite::params![claim],
            RawRecipient::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawRecipient::into_recipient).transpose()
  }

  async fn recipient_by_id(&self, id: Uuid) -> Result<Option<Recipient>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawRecipient> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {RECIPIENT_COLUMNS} FROM recipients WHERE id = ?1"),
            rusqlite::params![id_str],
            RawRecipient::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawRecipient::into_recipient).transpose()
  }

  async fn verified_recipient_exists<'a>(&'a self, claim_id: &'a str) -> Result<bool> {
    let claim = claim_id.to_owned();

    let exists: bool = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT 1 FROM recipients WHERE claim_id = ?1 AND status = 'verified'",
            rusqlite::params![claim],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false))
      })
      .await?;

    Ok(exists)
  }
}

// ─── PayoutStore impl ────────────────────────────────────────────────────────

impl PayoutStore for SqliteStore {
  type Error = Error;

  async fn create_payout_if_absent(&self, payout: Payout) -> Result<PayoutCreation> {
    let row = payout.clone();

    let id_str          = encode_uuid(row.id);
    let recipient_str   = encode_uuid(row.recipient_id);
    let status_str      = encode_payout_status(row.status).to_owned();
    let created_str     = encode_dt(row.created_at);
    let queued_str      = encode_opt_dt(row.queued_at);
    let sent_str        = encode_opt_dt(row.sent_at);
    let settled_str     = encode_opt_dt(row.settled_at);
    let next_retry_str  = encode_opt_dt(row.next_retry_at);
    let last_event_str  = encode_opt_dt(row.webhook_last_event_at);

    let created: bool = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let active: i64 = tx.query_row(
          "SELECT COUNT(*) FROM payouts
           WHERE claim_id = ?1 AND status NOT IN ('failed', 'cancelled')",
          rusqlite::params![row.claim_id],
          |r| r.get(0),
        )?;

        if active > 0 {
          return Ok(false);
        }

        tx.execute(
          "INSERT INTO payouts (
             id, claim_id, recipient_id, amount_eur, currency_destination,
             fx_rate, amount_destination, provider, provider_payout_id,
             status, failure_reason, failure_code, created_at, queued_at,
             sent_at, settled_at, retry_count, next_retry_at,
             webhook_last_event, webhook_last_event_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                     ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
          rusqlite::params![
            id_str,
            row.claim_id,
            recipient_str,
            row.amount_eur,
            row.currency_destination,
            row.fx_rate,
            row.amount_destination,
            row.provider,
            row.provider_payout_id,
            status_str,
            row.failure_reason,
            row.failure_code,
            created_str,
            queued_str,
            sent_str,
            settled_str,
            row.retry_count,
            next_retry_str,
            row.webhook_last_event,
            last_event_str,
          ],
        )?;

        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(if created {
      PayoutCreation::Created(payout)
    } else {
      PayoutCreation::AlreadyActive
    })
  }

  async fn update_payout(&self, payout: Payout) -> Result<()> {
    let id_str          = encode_uuid(payout.id);
    let status_str      = encode_payout_status(payout.status).to_owned();
    let queued_str      = encode_opt_dt(payout.queued_at);
    let sent_str        = encode_opt_dt(payout.sent_at);
    let settled_str     = encode_opt_dt(payout.settled_at);
    let next_retry_str  = encode_opt_dt(payout.next_retry_at);
    let last_event_str  = encode_opt_dt(payout.webhook_last_event_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE payouts SET
             fx_rate               = ?2,
             amount_destination    = ?3,
             provider_payout_id    = ?4,
             status                = ?5,
             failure_reason        = ?6,
             failure_code          = ?7,
             queued_at             = ?8,
             sent_at               = ?9,
             settled_at            = ?10,
             retry_count           = ?11,
             next_retry_at         = ?12,
             webhook_last_event    = ?13,
             webhook_last_event_at = ?14
           WHERE id = ?1",
          rusqlite::params![
            id_str,
            payout.fx_rate,
            payout.amount_destination,
            payout.provider_payout_id,
            status_str,
            payout.failure_reason,
            payout.failure_code,
            queued_str,
            sent_str,
            settled_str,
            payout.retry_count,
            next_retry_str,
            payout.webhook_last_event,
            last_event_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn payout_by_id(&self, id: Uuid) -> Result<Option<Payout>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawPayout> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {PAYOUT_COLUMNS} FROM payouts WHERE id = ?1"),
            rusqlite::params![id_str],
            RawPayout::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawPayout::into_payout).transpose()
  }

  async fn payout_by_claim<'a>(&'a self, claim_id: &'a str) -> Result<Option<Payout>> {
    let claim = claim_id.to_owned();

    let raw: Option<RawPayout> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {PAYOUT_COLUMNS} FROM payouts
               WHERE claim_id = ?1 ORDER BY created_at DESC LIMIT 1"
            ),
            rusqlite::params![claim],
            RawPayout::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawPayout::into_payout).transpose()
  }

  async fn payout_by_provider_id<'a>(
    &'a self,
    provider_payout_id: &'a str,
  ) -> Result<Option<Payout>> {
    let provider_id = provider_payout_id.to_owned();

    let raw: Option<RawPayout> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {PAYOUT_COLUMNS} FROM payouts WHERE provider_payout_id = ?1"
            ),
            rusqlite::params![provider_id],
            RawPayout::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawPayout::into_payout).transpose()
  }

  async fn active_payout_exists<'a>(&'a self, claim_id: &'a str) -> Result<bool> {
    let claim = claim_id.to_owned();

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM payouts
           WHERE claim_id = ?1 AND status NOT IN ('failed', 'cancelled')",
          rusqlite::params![claim],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(count > 0)
  }
}

// ─── ReconciliationStore impl ────────────────────────────────────────────────

impl ReconciliationStore for SqliteStore {
  type Error = Error;

  async fn insert_reconciliation(&self, record: ReconciliationRecord) -> Result<()> {
    let id_str       = encode_uuid(record.id);
    let received_str = encode_dt(record.received_at);
    let matched_str  = encode_opt_dt(record.matched_at);
    let status_str   = encode_reconciliation_status(record.status).to_owned();
    let created_str  = encode_dt(record.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO bank_reconciliations (
             id, bank_ref, amount_eur, received_at, matched_claim_id,
             matched_at, status, notes, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id_str,
            record.bank_ref,
            record.amount_eur,
            received_str,
            record.matched_claim_id,
            matched_str,
            status_str,
            record.notes,
            created_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn reconciliation_exists<'a>(&'a self, bank_ref: &'a str) -> Result<bool> {
    let bank_ref = bank_ref.to_owned();

    let exists: bool = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT 1 FROM bank_reconciliations WHERE bank_ref = ?1",
            rusqlite::params![bank_ref],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false))
      })
      .await?;

    Ok(exists)
  }

  async fn reconciliation_by_id(&self, id: Uuid) -> Result<Option<ReconciliationRecord>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawReconciliation> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {RECONCILIATION_COLUMNS} FROM bank_reconciliations WHERE id = ?1"
            ),
            rusqlite::params![id_str],
            RawReconciliation::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawReconciliation::into_record).transpose()
  }

  async fn matched_reconciliations(&self) -> Result<Vec<ReconciliationRecord>> {
    let raws: Vec<RawReconciliation> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RECONCILIATION_COLUMNS} FROM bank_reconciliations
           WHERE status = 'matched' AND matched_claim_id IS NOT NULL
           ORDER BY received_at ASC"
        ))?;
        let rows = stmt
          .query_map([], RawReconciliation::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReconciliation::into_record).collect()
  }

  async fn pending_reconciliations(&self) -> Result<Vec<ReconciliationRecord>> {
    let raws: Vec<RawReconciliation> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RECONCILIATION_COLUMNS} FROM bank_reconciliations
           WHERE status = 'pending_match'
           ORDER BY received_at DESC"
        ))?;
        let rows = stmt
          .query_map([], RawReconciliation::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReconciliation::into_record).collect()
  }

  async fn set_reconciliation_status(
    &self,
    id: Uuid,
    status: ReconciliationStatus,
    notes: Option<String>,
  ) -> Result<()> {
    let id_str     = encode_uuid(id);
    let status_str = encode_reconciliation_status(status).to_owned();

    self
      .conn
      .call(move |conn| {
        // COALESCE keeps any existing notes when the caller passes none.
        conn.execute(
          "UPDATE bank_reconciliations
           SET status = ?2, notes = COALESCE(?3, notes)
           WHERE id = ?1",
          rusqlite::params![id_str, status_str, notes],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn manual_match<'a>(&'a self, id: Uuid, claim_id: &'a str) -> Result<bool> {
    let id_str      = encode_uuid(id);
    let claim       = claim_id.to_owned();
    let matched_str = encode_dt(Utc::now());

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE bank_reconciliations
           SET matched_claim_id = ?2, matched_at = ?3, status = 'matched'
           WHERE id = ?1 AND status = 'pending_match'",
          rusqlite::params![id_str, claim, matched_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }
}

// ─── WebhookEventStore impl ──────────────────────────────────────────────────

impl WebhookEventStore for SqliteStore {
  type Error = Error;

  async fn log_webhook_event(&self, event: WebhookEventRecord) -> Result<()> {
    let id_str        = encode_uuid(event.id);
    let payout_str    = event.payout_id.map(encode_uuid);
    let payload_str   = event.payload.to_string();
    let processed_str = encode_dt(event.processed_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO webhook_events (
             id, event_type, payout_id, provider_payout_id, payload,
             processed_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            id_str,
            event.event_type,
            payout_str,
            event.provider_payout_id,
            payload_str,
            processed_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn webhook_event_count<'a>(&'a self, provider_payout_id: &'a str) -> Result<u32> {
    let provider_id = provider_payout_id.to_owned();

    let count: u32 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM webhook_events WHERE provider_payout_id = ?1",
          rusqlite::params![provider_id],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(count)
  }
}

//! SQL schema for the ClaimPay SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One recipient per claim; re-submissions replace the row in place.
CREATE TABLE IF NOT EXISTS recipients (
    id                   TEXT PRIMARY KEY,
    claim_id             TEXT NOT NULL UNIQUE,
    customer_id          TEXT NOT NULL,
    first_name           TEXT NOT NULL,
    last_name            TEXT NOT NULL,
    email                TEXT NOT NULL,
    phone                TEXT,
    country              TEXT NOT NULL,
    address_street       TEXT NOT NULL,
    address_city         TEXT NOT NULL,
    address_postal       TEXT NOT NULL,
    date_of_birth        TEXT,
    document_type        TEXT NOT NULL,
    document_number      TEXT NOT NULL,
    payout_method        TEXT NOT NULL,   -- 'bank' | 'card'
    iban                 TEXT,
    bic                  TEXT,
    account_holder_name  TEXT,
    bank_name            TEXT,
    card_token           TEXT,
    card_last4           TEXT,
    card_brand           TEXT,
    currency_preferred   TEXT NOT NULL DEFAULT 'EUR',
    status               TEXT NOT NULL DEFAULT 'pending',
    validation_errors    TEXT,            -- JSON array or NULL
    kyc_screening_result TEXT,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);

-- Payouts are never deleted; failed/cancelled rows stay as audit history.
CREATE TABLE IF NOT EXISTS payouts (
    id                    TEXT PRIMARY KEY,
    claim_id              TEXT NOT NULL,
    recipient_id          TEXT NOT NULL,
    amount_eur            REAL NOT NULL,
    currency_destination  TEXT NOT NULL,
    fx_rate               REAL,
    amount_destination    REAL,
    provider              TEXT NOT NULL,
    provider_payout_id    TEXT,
    status                TEXT NOT NULL,
    failure_reason        TEXT,
    failure_code          TEXT,
    created_at            TEXT NOT NULL,
    queued_at             TEXT,
    sent_at               TEXT,
    settled_at            TEXT,
    retry_count           INTEGER NOT NULL DEFAULT 0,
    next_retry_at         TEXT,
    webhook_last_event    TEXT,
    webhook_last_event_at TEXT
);

-- One row per distinct incoming bank credit; bank_ref is the dedup key.
CREATE TABLE IF NOT EXISTS bank_reconciliations (
    id               TEXT PRIMARY KEY,
    bank_ref         TEXT NOT NULL UNIQUE,
    amount_eur       REAL NOT NULL,
    received_at      TEXT NOT NULL,
    matched_claim_id TEXT,
    matched_at       TEXT,
    status           TEXT NOT NULL DEFAULT 'pending_match',
    notes            TEXT,
    created_at       TEXT NOT NULL
);

-- Append-only audit log of processed provider events.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS webhook_events (
    id                 TEXT PRIMARY KEY,
    event_type         TEXT NOT NULL,
    payout_id          TEXT,
    provider_payout_id TEXT,
    payload            TEXT NOT NULL,
    processed_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS payouts_claim_idx    ON payouts(claim_id);
CREATE INDEX IF NOT EXISTS payouts_provider_idx ON payouts(provider_payout_id);
CREATE INDEX IF NOT EXISTS payouts_status_idx   ON payouts(status);
CREATE INDEX IF NOT EXISTS recon_status_idx     ON bank_reconciliations(status);

PRAGMA user_version = 1;
";

//! SQL schema for the menucard SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Local identity accounts. Only used when the server is configured with the
-- local identity provider.
CREATE TABLE IF NOT EXISTS accounts (
    account_id         TEXT PRIMARY KEY,
    email              TEXT NOT NULL UNIQUE,   -- normalised, lower-case
    email_confirmed_at TEXT,                   -- RFC 3339 UTC or NULL
    created_at         TEXT NOT NULL
);

-- One row per provisioned upstream order. The UNIQUE constraint on
-- order_id is what makes redelivered webhooks idempotent.
-- account_id is not a foreign key: the account may live in a remote
-- identity provider.
CREATE TABLE IF NOT EXISTS entitlements (
    entitlement_id TEXT PRIMARY KEY,
    order_id       TEXT NOT NULL UNIQUE,
    email          TEXT NOT NULL,
    account_id     TEXT NOT NULL,
    product        TEXT NOT NULL,
    status         TEXT NOT NULL DEFAULT 'active'
                   CHECK (status IN ('active', 'expired')),
    created_at     TEXT NOT NULL,
    expires_at     TEXT
);

CREATE INDEX IF NOT EXISTS entitlements_email_idx   ON entitlements(email, status);
CREATE INDEX IF NOT EXISTS entitlements_expires_idx ON entitlements(expires_at);

PRAGMA user_version = 1;
";

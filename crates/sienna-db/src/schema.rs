//! SQL schema definitions.

/// Complete schema for the Sienna v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Identities & Auth
-- ============================================================

CREATE TABLE IF NOT EXISTS identities (
    id INTEGER PRIMARY KEY,
    wallet_address TEXT UNIQUE,
    handle TEXT NOT NULL UNIQUE,
    email TEXT UNIQUE,
    password_hash TEXT,
    role TEXT NOT NULL DEFAULT 'fan',
    active INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    CHECK (wallet_address IS NOT NULL OR email IS NOT NULL)
);

-- Consumed nonces are kept, never deleted: the single-use guarantee is the
-- conditional flip of `consumed`, and history aids auditing.
CREATE TABLE IF NOT EXISTS nonces (
    id INTEGER PRIMARY KEY,
    identity_id INTEGER NOT NULL REFERENCES identities(id),
    value TEXT NOT NULL,
    expires_at INTEGER NOT NULL,
    consumed INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_nonces_lookup ON nonces(identity_id, value);

CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY,
    identity_id INTEGER NOT NULL REFERENCES identities(id),
    refresh_token TEXT NOT NULL UNIQUE,
    expires_at INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_identity ON sessions(identity_id);

-- ============================================================
-- Creators
-- ============================================================

CREATE TABLE IF NOT EXISTS creator_profiles (
    wallet_address TEXT PRIMARY KEY,
    identity_id INTEGER NOT NULL UNIQUE REFERENCES identities(id),
    display_name TEXT NOT NULL UNIQUE,
    subscription_price INTEGER NOT NULL DEFAULT 0,
    total_earnings INTEGER NOT NULL DEFAULT 0,
    subscriber_count INTEGER NOT NULL DEFAULT 0,
    verified INTEGER NOT NULL DEFAULT 0,
    contract_address TEXT,
    registered_at INTEGER
);

-- ============================================================
-- Payments
-- ============================================================

CREATE TABLE IF NOT EXISTS payments (
    tx_hash TEXT PRIMARY KEY,
    payer_id INTEGER NOT NULL REFERENCES identities(id),
    creator_wallet TEXT NOT NULL REFERENCES creator_profiles(wallet_address),
    total_amount INTEGER NOT NULL,
    platform_fee INTEGER NOT NULL,
    creator_amount INTEGER NOT NULL,
    kind TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'processing',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_payments_payer ON payments(payer_id);
CREATE INDEX IF NOT EXISTS idx_payments_creator ON payments(creator_wallet);

-- ============================================================
-- Subscriptions
-- ============================================================

CREATE TABLE IF NOT EXISTS subscriptions (
    token_id INTEGER PRIMARY KEY,
    subscriber_id INTEGER NOT NULL REFERENCES identities(id),
    creator_wallet TEXT NOT NULL REFERENCES creator_profiles(wallet_address),
    price INTEGER NOT NULL,
    started_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    auto_renew INTEGER NOT NULL DEFAULT 1,
    cancelled_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_subs_subscriber ON subscriptions(subscriber_id);
CREATE INDEX IF NOT EXISTS idx_subs_creator_active ON subscriptions(creator_wallet, active);
CREATE INDEX IF NOT EXISTS idx_subs_expiry ON subscriptions(active, expires_at);

-- ============================================================
-- Settings & Misc
-- ============================================================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

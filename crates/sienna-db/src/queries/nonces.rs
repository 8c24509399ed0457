//! Login nonce query functions.

use rusqlite::Connection;

use sienna_types::IdentityId;

use crate::{DbError, Result};

/// Insert a freshly issued nonce.
pub fn insert(
    conn: &Connection,
    identity_id: IdentityId,
    value: &str,
    created_at: u64,
    expires_at: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO nonces (identity_id, value, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![identity_id, value, expires_at as i64, created_at as i64],
    )?;
    Ok(())
}

/// Consume a nonce: a single conditional update that only succeeds if the
/// nonce exists, is unconsumed, and has not expired. Zero rows means the
/// challenge is unusable, whatever the reason; concurrent consumers cannot
/// both win.
pub fn consume(conn: &Connection, identity_id: IdentityId, value: &str, now: u64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE nonces SET consumed = 1
         WHERE identity_id = ?1 AND value = ?2 AND consumed = 0 AND expires_at >= ?3",
        rusqlite::params![identity_id, value, now as i64],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(
            "nonce not found, already consumed, or expired".into(),
        ));
    }
    Ok(())
}

/// Count rows for an identity (consumed ones included; they are never
/// deleted).
pub fn count_for_identity(conn: &Connection, identity_id: IdentityId) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM nonces WHERE identity_id = ?1",
        [identity_id],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

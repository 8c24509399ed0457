//! Session query functions.
//!
//! A session row ties a refresh token to an identity with an absolute
//! expiry. Rotation swaps the token in place; logout deletes every row for
//! the identity.

use rusqlite::{Connection, OptionalExtension};

use sienna_types::IdentityId;

use crate::{DbError, Result};

/// A session row.
#[derive(Clone, Debug)]
pub struct SessionRow {
    pub id: i64,
    pub identity_id: IdentityId,
    pub refresh_token: String,
    pub expires_at: u64,
    pub created_at: u64,
}

/// Insert a session for a freshly issued refresh token.
pub fn insert(
    conn: &Connection,
    identity_id: IdentityId,
    refresh_token: &str,
    expires_at: u64,
    now: u64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO sessions (identity_id, refresh_token, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![identity_id, refresh_token, expires_at as i64, now as i64],
    )
    .map_err(DbError::classify)?;
    Ok(conn.last_insert_rowid())
}

/// Look a session up by its refresh token.
pub fn find_by_token(conn: &Connection, refresh_token: &str) -> Result<Option<SessionRow>> {
    Ok(conn
        .query_row(
            "SELECT id, identity_id, refresh_token, expires_at, created_at
             FROM sessions WHERE refresh_token = ?1",
            [refresh_token],
            |row| {
                Ok(SessionRow {
                    id: row.get(0)?,
                    identity_id: row.get(1)?,
                    refresh_token: row.get(2)?,
                    expires_at: row.get::<_, i64>(3)? as u64,
                    created_at: row.get::<_, i64>(4)? as u64,
                })
            },
        )
        .optional()?)
}

/// Rotate a session in place: replace the stored refresh token and push the
/// expiry out. Conditional on the old token still being the stored one, so
/// two concurrent refreshes cannot both rotate the same session.
pub fn rotate(
    conn: &Connection,
    old_token: &str,
    new_token: &str,
    new_expires_at: u64,
) -> Result<usize> {
    conn.execute(
        "UPDATE sessions SET refresh_token = ?2, expires_at = ?3
         WHERE refresh_token = ?1",
        rusqlite::params![old_token, new_token, new_expires_at as i64],
    )
    .map_err(DbError::classify)
}

/// Delete a single session by refresh token. Used when a session is found
/// expired during refresh.
pub fn delete_by_token(conn: &Connection, refresh_token: &str) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM sessions WHERE refresh_token = ?1",
        [refresh_token],
    )?)
}

/// Delete every session for an identity. Unconditional and idempotent.
pub fn delete_for_identity(conn: &Connection, identity_id: IdentityId) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM sessions WHERE identity_id = ?1",
        [identity_id],
    )?)
}

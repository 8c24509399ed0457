//! Identity query functions.

use rusqlite::{Connection, OptionalExtension};

use sienna_types::identity::{Identity, Role};
use sienna_types::{IdentityId, WalletAddress};

use crate::{DbError, Result};

const COLUMNS: &str = "id, wallet_address, handle, email, role, active, created_at";

/// Insert a wallet-backed identity, returning its row id.
///
/// A duplicate wallet address or handle surfaces as [`DbError::Constraint`].
pub fn insert_wallet(
    conn: &Connection,
    wallet: &WalletAddress,
    handle: &str,
    role: Role,
    now: u64,
) -> Result<IdentityId> {
    conn.execute(
        "INSERT INTO identities (wallet_address, handle, role, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![wallet.as_str(), handle, role.as_str(), now as i64],
    )
    .map_err(DbError::classify)?;
    Ok(conn.last_insert_rowid())
}

/// Insert an email-backed identity, returning its row id.
pub fn insert_email(
    conn: &Connection,
    email: &str,
    password_hash: &str,
    handle: &str,
    role: Role,
    now: u64,
) -> Result<IdentityId> {
    conn.execute(
        "INSERT INTO identities (email, password_hash, handle, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![email, password_hash, handle, role.as_str(), now as i64],
    )
    .map_err(DbError::classify)?;
    Ok(conn.last_insert_rowid())
}

/// Look an identity up by canonical wallet address.
pub fn find_by_wallet(conn: &Connection, wallet: &WalletAddress) -> Result<Option<Identity>> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM identities WHERE wallet_address = ?1"),
            [wallet.as_str()],
            raw_from_row,
        )
        .optional()?;
    raw.map(into_identity).transpose()
}

/// Look an identity up by email.
pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<Identity>> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM identities WHERE email = ?1"),
            [email],
            raw_from_row,
        )
        .optional()?;
    raw.map(into_identity).transpose()
}

/// Fetch an identity by row id.
pub fn get(conn: &Connection, id: IdentityId) -> Result<Identity> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM identities WHERE id = ?1"),
            [id],
            raw_from_row,
        )
        .optional()?;
    match raw {
        Some(r) => into_identity(r),
        None => Err(DbError::NotFound(format!("identity {id}"))),
    }
}

/// Stored password hash for an email credential, if any.
pub fn password_hash_by_email(conn: &Connection, email: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT password_hash FROM identities WHERE email = ?1",
            [email],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?
        .flatten())
}

/// Promote an identity to the creator role. No-op if already a creator.
pub fn promote_to_creator(conn: &Connection, id: IdentityId) -> Result<()> {
    conn.execute(
        "UPDATE identities SET role = 'creator' WHERE id = ?1",
        [id],
    )?;
    Ok(())
}

/// Soft-deactivate (or reactivate) an identity. Rows are never deleted.
pub fn set_active(conn: &Connection, id: IdentityId, active: bool) -> Result<()> {
    let updated = conn.execute(
        "UPDATE identities SET active = ?1 WHERE id = ?2",
        rusqlite::params![active as i64, id],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("identity {id}")));
    }
    Ok(())
}

struct RawIdentity {
    id: i64,
    wallet_address: Option<String>,
    handle: String,
    email: Option<String>,
    role: String,
    active: i64,
    created_at: i64,
}

fn raw_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawIdentity> {
    Ok(RawIdentity {
        id: row.get(0)?,
        wallet_address: row.get(1)?,
        handle: row.get(2)?,
        email: row.get(3)?,
        role: row.get(4)?,
        active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn into_identity(raw: RawIdentity) -> Result<Identity> {
    let wallet_address = raw
        .wallet_address
        .map(|s| WalletAddress::parse(&s))
        .transpose()
        .map_err(|e| DbError::Serialization(e.to_string()))?;
    let role = Role::parse(&raw.role)
        .ok_or_else(|| DbError::Serialization(format!("unknown role '{}'", raw.role)))?;
    Ok(Identity {
        id: raw.id,
        wallet_address,
        handle: raw.handle,
        email: raw.email,
        role,
        active: raw.active != 0,
        created_at: raw.created_at as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    fn wallet(byte: u8) -> WalletAddress {
        WalletAddress::from_bytes(&[byte; 20])
    }

    #[test]
    fn test_insert_and_find_by_wallet() {
        let conn = test_db();
        let w = wallet(1);
        let id = insert_wallet(&conn, &w, "user_aabbccddee01", Role::Fan, 100).expect("insert");

        let found = find_by_wallet(&conn, &w).expect("query").expect("found");
        assert_eq!(found.id, id);
        assert_eq!(found.wallet_address, Some(w));
        assert_eq!(found.role, Role::Fan);
        assert!(found.active);
        assert_eq!(found.email, None);
    }

    #[test]
    fn test_duplicate_wallet_is_constraint() {
        let conn = test_db();
        let w = wallet(2);
        insert_wallet(&conn, &w, "user_000000000001", Role::Fan, 100).expect("insert");
        let err = insert_wallet(&conn, &w, "user_000000000002", Role::Fan, 101)
            .expect_err("duplicate wallet");
        assert!(matches!(err, DbError::Constraint(_)));
    }

    #[test]
    fn test_duplicate_handle_is_constraint() {
        let conn = test_db();
        insert_wallet(&conn, &wallet(3), "same_handle", Role::Fan, 100).expect("insert");
        let err = insert_wallet(&conn, &wallet(4), "same_handle", Role::Fan, 101)
            .expect_err("duplicate handle");
        assert!(matches!(err, DbError::Constraint(_)));
    }

    #[test]
    fn test_email_identity_round_trip() {
        let conn = test_db();
        let id = insert_email(&conn, "a@b.example", "$argon2id$stub", "handle_a", Role::Fan, 50)
            .expect("insert");
        let found = find_by_email(&conn, "a@b.example").expect("query").expect("found");
        assert_eq!(found.id, id);
        assert_eq!(found.wallet_address, None);
        let hash = password_hash_by_email(&conn, "a@b.example").expect("query");
        assert_eq!(hash.as_deref(), Some("$argon2id$stub"));
        assert_eq!(
            password_hash_by_email(&conn, "missing@x").expect("query"),
            None
        );
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let conn = test_db();
        assert!(matches!(get(&conn, 4242), Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_promote_and_deactivate() {
        let conn = test_db();
        let id = insert_wallet(&conn, &wallet(5), "user_promote", Role::Fan, 100).expect("insert");
        promote_to_creator(&conn, id).expect("promote");
        assert_eq!(get(&conn, id).expect("get").role, Role::Creator);

        set_active(&conn, id, false).expect("deactivate");
        assert!(!get(&conn, id).expect("get").active);
        // Row still exists: soft delete only.
        assert!(find_by_wallet(&conn, &wallet(5)).expect("query").is_some());
    }
}

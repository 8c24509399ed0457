//! Email/password credential, for clients without a wallet.
//!
//! Registration is insert-then-detect: the unique indexes on email and
//! handle are the only duplicate check, so two concurrent registrations of
//! the same email cannot both succeed.

use rusqlite::Connection;
use tracing::debug;

use sienna_crypto::{nonce as nonce_gen, password};
use sienna_db::{queries, DbError};
use sienna_types::identity::{Identity, Role};

use crate::{AuthError, Result};

const MIN_PASSWORD_LEN: usize = 8;

/// Register an email identity. The handle defaults to a generated one.
pub fn register_email(
    conn: &Connection,
    email: &str,
    plain_password: &str,
    handle: Option<&str>,
    role: Role,
    now: u64,
) -> Result<Identity> {
    let email = email.trim().to_ascii_lowercase();
    if !email.contains('@') || email.len() < 3 {
        return Err(AuthError::Validation(format!("invalid email '{email}'")));
    }
    if plain_password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let hash = password::hash_password(plain_password)?;
    let handle = handle
        .map(str::to_string)
        .unwrap_or_else(nonce_gen::random_handle);

    let id = match queries::identities::insert_email(conn, &email, &hash, &handle, role, now) {
        Ok(id) => id,
        Err(DbError::Constraint(c)) => return Err(AuthError::Conflict(c)),
        Err(e) => return Err(e.into()),
    };
    debug!(email, handle, "registered email identity");
    Ok(queries::identities::get(conn, id)?)
}

/// Verify an email credential.
///
/// Unknown email and wrong password are separate variants here; the daemon
/// collapses them before anything reaches the wire.
pub fn login_email(conn: &Connection, email: &str, plain_password: &str) -> Result<Identity> {
    let email = email.trim().to_ascii_lowercase();
    let stored = queries::identities::password_hash_by_email(conn, &email)?
        .ok_or(AuthError::UserNotFound)?;

    if !password::verify_password(plain_password, &stored)? {
        return Err(AuthError::BadCredentials);
    }

    let identity = queries::identities::find_by_email(conn, &email)?
        .ok_or(AuthError::UserNotFound)?;
    if !identity.active {
        return Err(AuthError::UserNotFound);
    }
    Ok(identity)
}

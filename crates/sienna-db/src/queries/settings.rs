//! Settings key/value query functions.
//!
//! Holds daemon bookkeeping, most importantly the projector's persisted
//! block cursor.

use rusqlite::{Connection, OptionalExtension};

use crate::Result;

/// Settings key for the last chain block the projector has fully processed.
pub const PROJECTOR_CURSOR: &str = "projector_cursor";

/// Get a setting value.
pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?)
}

/// Set a setting value, inserting or overwriting.
pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

/// Read the projector's block cursor. Unset or unparsable values read as 0,
/// which makes the projector backfill from genesis; redelivery is safe.
pub fn projector_cursor(conn: &Connection) -> Result<u64> {
    Ok(get(conn, PROJECTOR_CURSOR)?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0))
}

/// Persist the projector's block cursor.
pub fn set_projector_cursor(conn: &Connection, block: u64) -> Result<()> {
    set(conn, PROJECTOR_CURSOR, &block.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_get_set_overwrite() {
        let conn = test_db();
        assert_eq!(get(&conn, "missing").expect("get"), None);
        set(&conn, "k", "v1").expect("set");
        set(&conn, "k", "v2").expect("overwrite");
        assert_eq!(get(&conn, "k").expect("get").as_deref(), Some("v2"));
    }

    #[test]
    fn test_cursor_round_trip() {
        let conn = test_db();
        // Migration seeds the cursor at 0.
        assert_eq!(projector_cursor(&conn).expect("cursor"), 0);
        set_projector_cursor(&conn, 123_456).expect("set");
        assert_eq!(projector_cursor(&conn).expect("cursor"), 123_456);
    }

    #[test]
    fn test_garbage_cursor_reads_as_zero() {
        let conn = test_db();
        set(&conn, PROJECTOR_CURSOR, "not a number").expect("set");
        assert_eq!(projector_cursor(&conn).expect("cursor"), 0);
    }
}

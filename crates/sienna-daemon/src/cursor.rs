//! Event-source cursor persisted in the settings table.
//!
//! The cursor lives in the same database the projector writes, so an event
//! applied and a cursor advanced are never far apart; on restart the source
//! backfills from the persisted block and the projector's idempotency
//! absorbs the overlap.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use sienna_chain::{ChainError, CursorStore};
use sienna_db::queries;

pub struct SettingsCursor {
    db: Arc<Mutex<Connection>>,
}

impl SettingsCursor {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CursorStore for SettingsCursor {
    async fn load(&self) -> sienna_chain::Result<u64> {
        let db = self.db.lock().await;
        queries::settings::projector_cursor(&db).map_err(|e| ChainError::Cursor(e.to_string()))
    }

    async fn store(&self, block: u64) -> sienna_chain::Result<()> {
        let db = self.db.lock().await;
        queries::settings::set_projector_cursor(&db, block)
            .map_err(|e| ChainError::Cursor(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cursor_round_trip() {
        let db = Arc::new(Mutex::new(sienna_db::open_memory().expect("open")));
        let cursor = SettingsCursor::new(db);

        assert_eq!(cursor.load().await.expect("load"), 0);
        cursor.store(1_234).await.expect("store");
        assert_eq!(cursor.load().await.expect("load"), 1_234);
    }
}

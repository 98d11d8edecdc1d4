//! Opening the SQLite store.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_rusqlite::Connection;

use super::migrations;
use crate::Error;
use crate::clock::{Clock, SystemClock};

/// Applied on every open, before migrations.
const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
PRAGMA synchronous=NORMAL;
PRAGMA busy_timeout=5000;
PRAGMA temp_store=MEMORY;";

/// Durable store handle shared by the cache and the ZIP crosswalk.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread. Cloning is cheap and shares the connection.
#[derive(Clone, Debug)]
pub struct Store {
    pub(crate) conn: Connection,
    clock: Arc<dyn Clock>,
}

impl Store {
    /// Open (creating if needed) the database file and migrate it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        tracing::debug!(path = %path.display(), "opened store");
        Self::init(conn).await
    }

    /// Private in-memory database, used by tests.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    /// Replace the clock used for `created_at`/`expires_at` bookkeeping.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current time according to the store's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| conn.execute_batch(PRAGMAS)).await.map_err(Error::Database)?;
        migrations::run(&conn).await?;
        Ok(Self { conn, clock: Arc::new(SystemClock) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("costmap.sqlite");

        let db = Store::open(&path).await.unwrap();
        db.set(crate::Source::PriceParity, "states:2022", &vec![1, 2], chrono::TimeDelta::days(1)).await;
        drop(db);

        let reopened = Store::open(&path).await.unwrap();
        let hit = reopened.get::<Vec<i32>>(crate::Source::PriceParity, "states:2022").await.unwrap();
        assert_eq!(hit.payload, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_wal_enabled_for_files() {
        let dir = tempfile::tempdir().unwrap();
        let db = Store::open(dir.path().join("wal.sqlite")).await.unwrap();
        let mode: String = db
            .conn
            .call(|conn| conn.query_row("PRAGMA journal_mode", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn test_with_clock() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let db = Store::open_in_memory()
            .await
            .unwrap()
            .with_clock(Arc::new(ManualClock::new(start)));
        assert_eq!(db.now(), start);
    }
}

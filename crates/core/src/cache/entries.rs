//! Cache entry operations.
//!
//! Reads fail open: a store error, a malformed row, or an expired entry all
//! look like a miss so the caller falls through to a fresh fetch. Writes
//! report success as a bool and never surface an error to the read path.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_rusqlite::{params, rusqlite};

use super::Source;
use crate::Error;
use crate::store::Store;
use crate::sweep::Sweeper;

/// A payload read back from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPayload<T> {
    pub payload: T,
    pub age_seconds: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

struct RawRow {
    data: String,
    created_at: i64,
    expires_at: i64,
}

impl Store {
    /// Look up a fresh entry for `(source, key)`.
    ///
    /// Returns None on miss, expiry, store failure, or a payload that does
    /// not decode into `T`.
    pub async fn get<T: DeserializeOwned>(&self, source: Source, key: &str) -> Option<CachedPayload<T>> {
        let now = self.now();
        let row = match self.get_row(source, key, now.timestamp_millis()).await {
            Ok(Some(row)) => row,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(source = %source, key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        let (Some(created_at), Some(expires_at)) =
            (DateTime::from_timestamp_millis(row.created_at), DateTime::from_timestamp_millis(row.expires_at))
        else {
            tracing::warn!(source = %source, key, "cache row has invalid timestamps, treating as miss");
            return None;
        };

        match serde_json::from_str::<T>(&row.data) {
            Ok(payload) => {
                let age_seconds = (now - created_at).num_seconds().max(0);
                Some(CachedPayload { payload, age_seconds, created_at, expires_at })
            }
            Err(e) => {
                tracing::warn!(source = %source, key, error = %e, "cache payload malformed, treating as miss");
                None
            }
        }
    }

    /// Store a payload with `expires_at = now + ttl`.
    ///
    /// Upserts on `(source, key)`. Refuses null payloads, empty keys, and
    /// non-positive TTLs. Returns whether the write landed.
    pub async fn set<T: Serialize + ?Sized>(&self, source: Source, key: &str, payload: &T, ttl: TimeDelta) -> bool {
        if key.is_empty() || ttl <= TimeDelta::zero() {
            tracing::debug!(source = %source, key, "refusing cache write with empty key or non-positive ttl");
            return false;
        }

        let data = match serde_json::to_value(payload) {
            Ok(serde_json::Value::Null) => {
                tracing::debug!(source = %source, key, "refusing to cache null payload");
                return false;
            }
            Ok(value) => value.to_string(),
            Err(e) => {
                tracing::warn!(source = %source, key, error = %e, "cache payload failed to serialize");
                return false;
            }
        };

        let created_at = self.now().timestamp_millis();
        let expires_at = created_at.saturating_add(ttl.num_milliseconds());

        match self.put_row(source, key, data, created_at, expires_at).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(source = %source, key, error = %e, "cache write failed");
                false
            }
        }
    }

    /// Delete entries by source, key, both, or everything when neither is given.
    ///
    /// Returns the number of deleted entries.
    pub async fn invalidate(&self, source: Option<Source>, key: Option<&str>) -> Result<u64, Error> {
        let key = key.map(str::to_string);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = match (source, key) {
                    (Some(source), Some(key)) => conn.execute(
                        "DELETE FROM cache_entries WHERE source = ?1 AND location_key = ?2",
                        params![source.as_str(), key],
                    )?,
                    (Some(source), None) => {
                        conn.execute("DELETE FROM cache_entries WHERE source = ?1", params![source.as_str()])?
                    }
                    (None, Some(key)) => {
                        conn.execute("DELETE FROM cache_entries WHERE location_key = ?1", params![key])?
                    }
                    (None, None) => conn.execute("DELETE FROM cache_entries", [])?,
                };
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete expired entries.
    ///
    /// Returns the number of deleted entries.
    pub async fn sweep(&self) -> Result<u64, Error> {
        let now = self.now().timestamp_millis();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cache_entries WHERE expires_at < ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Run [`Store::sweep`] every `period` until the returned handle is stopped.
    pub fn start_sweeper(&self, period: Duration) -> Sweeper {
        let store = self.clone();
        Sweeper::spawn("cache", period, move || {
            let store = store.clone();
            async move {
                match store.sweep().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::debug!(removed, "swept expired cache entries"),
                    Err(e) => tracing::warn!(error = %e, "cache sweep failed"),
                }
            }
        })
    }

    /// Count stored entries, optionally for one source. Includes expired rows not yet swept.
    pub async fn count(&self, source: Option<Source>) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = match source {
                    Some(source) => conn.query_row(
                        "SELECT COUNT(*) FROM cache_entries WHERE source = ?1",
                        params![source.as_str()],
                        |row| row.get(0),
                    )?,
                    None => conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?,
                };
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn get_row(&self, source: Source, key: &str, now: i64) -> Result<Option<RawRow>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<RawRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT data, created_at, expires_at FROM cache_entries
                     WHERE source = ?1 AND location_key = ?2 AND expires_at > ?3",
                )?;

                let result = stmt.query_row(params![source.as_str(), key, now], |row| {
                    Ok(RawRow { data: row.get(0)?, created_at: row.get(1)?, expires_at: row.get(2)? })
                });

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn put_row(
        &self, source: Source, key: &str, data: String, created_at: i64, expires_at: i64,
    ) -> Result<(), Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_entries (source, location_key, data, created_at, expires_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(source, location_key) DO UPDATE SET
                        data = excluded.data,
                        created_at = excluded.created_at,
                        expires_at = excluded.expires_at",
                    params![source.as_str(), key, data, created_at, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        geo: String,
        overall: f64,
    }

    async fn store_at(clock: &ManualClock) -> Store {
        Store::open_in_memory()
            .await
            .unwrap()
            .with_clock(Arc::new(clock.clone()))
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_set_then_get_within_ttl() {
        let clock = ManualClock::new(start());
        let db = store_at(&clock).await;
        let payload = Payload { geo: "06000".into(), overall: 112.6 };

        assert!(db.set(Source::PriceParity, "states:2022", &payload, Source::PriceParity.ttl()).await);
        clock.advance(TimeDelta::seconds(125));

        let hit = db.get::<Payload>(Source::PriceParity, "states:2022").await.unwrap();
        assert_eq!(hit.payload, payload);
        assert_eq!(hit.age_seconds, 125);
        assert_eq!(hit.expires_at, start() + TimeDelta::days(30));
    }

    #[tokio::test]
    async fn test_get_after_expiry_is_none() {
        let clock = ManualClock::new(start());
        let db = store_at(&clock).await;

        assert!(db.set(Source::Energy, "all", &Payload { geo: "US".into(), overall: 1.0 }, TimeDelta::hours(1)).await);
        clock.advance(TimeDelta::hours(1) + TimeDelta::seconds(1));

        assert!(db.get::<Payload>(Source::Energy, "all").await.is_none());
    }

    #[tokio::test]
    async fn test_upsert_keeps_latest_only() {
        let clock = ManualClock::new(start());
        let db = store_at(&clock).await;
        let key = "zip:90210";

        db.set(Source::FairMarketRent, key, &Payload { geo: "old".into(), overall: 1.0 }, TimeDelta::days(1))
            .await;
        db.set(Source::FairMarketRent, key, &Payload { geo: "new".into(), overall: 2.0 }, TimeDelta::days(1))
            .await;

        let hit = db.get::<Payload>(Source::FairMarketRent, key).await.unwrap();
        assert_eq!(hit.payload.geo, "new");
        assert_eq!(db.count(Some(Source::FairMarketRent)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_same_key_different_sources_are_distinct() {
        let db = Store::open_in_memory().await.unwrap();
        db.set(Source::PriceIndex, "state:CA", &1, TimeDelta::days(1)).await;
        db.set(Source::Energy, "state:CA", &2, TimeDelta::days(1)).await;

        assert_eq!(db.get::<i32>(Source::PriceIndex, "state:CA").await.unwrap().payload, 1);
        assert_eq!(db.get::<i32>(Source::Energy, "state:CA").await.unwrap().payload, 2);
    }

    #[tokio::test]
    async fn test_refuses_null_payload_and_bad_ttl() {
        let db = Store::open_in_memory().await.unwrap();
        let nothing: Option<Payload> = None;

        assert!(!db.set(Source::Energy, "all", &nothing, TimeDelta::days(1)).await);
        assert!(!db.set(Source::Energy, "all", &1, TimeDelta::zero()).await);
        assert!(!db.set(Source::Energy, "", &1, TimeDelta::days(1)).await);
        assert_eq!(db.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_miss() {
        let db = Store::open_in_memory().await.unwrap();
        db.set(Source::PriceIndex, "series", &"not a payload", TimeDelta::days(1))
            .await;

        assert!(db.get::<Payload>(Source::PriceIndex, "series").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_dimensions() {
        let db = Store::open_in_memory().await.unwrap();
        for source in Source::ALL {
            db.set(source, "zip:10001", &1, TimeDelta::days(1)).await;
            db.set(source, "zip:60601", &1, TimeDelta::days(1)).await;
        }

        assert_eq!(db.invalidate(Some(Source::Energy), Some("zip:10001")).await.unwrap(), 1);
        assert_eq!(db.invalidate(Some(Source::Energy), None).await.unwrap(), 1);
        assert_eq!(db.invalidate(None, Some("zip:10001")).await.unwrap(), 3);
        assert_eq!(db.invalidate(None, None).await.unwrap(), 3);
        assert_eq!(db.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let clock = ManualClock::new(start());
        let db = store_at(&clock).await;
        db.set(Source::PriceIndex, "expiring", &1, TimeDelta::seconds(10)).await;
        db.set(Source::PriceParity, "fresh", &1, TimeDelta::days(30)).await;

        clock.advance(TimeDelta::seconds(11));

        assert_eq!(db.sweep().await.unwrap(), 1);
        assert!(db.get::<i32>(Source::PriceIndex, "expiring").await.is_none());
        assert!(db.get::<i32>(Source::PriceParity, "fresh").await.is_some());
    }

    #[tokio::test]
    async fn test_background_sweeper_deletes_expired_rows() {
        let clock = ManualClock::new(start());
        let db = store_at(&clock).await;
        db.set(Source::Energy, "old", &1, TimeDelta::seconds(5)).await;
        clock.advance(TimeDelta::seconds(6));

        let sweeper = db.start_sweeper(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(80)).await;
        sweeper.stop().await;

        assert_eq!(db.count(None).await.unwrap(), 0);
    }
}

//! Crosswalk table access.

use tokio_rusqlite::params;

use super::CrosswalkRecord;
use crate::Error;
use crate::store::Store;

impl Store {
    /// Upsert crosswalk rows keyed by `(zip_code, metro_code)` in one transaction.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParams` if any ratio falls outside `[0, 1]` or any ZIP is
    /// malformed; nothing is written in that case.
    pub async fn load_crosswalk(&self, records: &[CrosswalkRecord]) -> Result<u64, Error> {
        for record in records {
            super::validate_zip(&record.zip_code)?;
            if !(0.0..=1.0).contains(&record.residential_ratio) {
                return Err(Error::InvalidParams(format!(
                    "residential ratio {} for ZIP {} metro {} is outside [0, 1]",
                    record.residential_ratio, record.zip_code, record.metro_code
                )));
            }
        }

        let records = records.to_vec();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO zip_crosswalk (zip_code, metro_code, metro_name, residential_ratio)
                        VALUES (?1, ?2, ?3, ?4)
                        ON CONFLICT(zip_code, metro_code) DO UPDATE SET
                            metro_name = excluded.metro_name,
                            residential_ratio = excluded.residential_ratio",
                    )?;
                    for record in &records {
                        stmt.execute(params![
                            record.zip_code.trim(),
                            record.metro_code,
                            record.metro_name,
                            record.residential_ratio
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(records.len() as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// All rows for one ZIP, in insertion order.
    pub async fn crosswalk_for_zip(&self, zip: &str) -> Result<Vec<CrosswalkRecord>, Error> {
        let zip = zip.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<CrosswalkRecord>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT zip_code, metro_code, metro_name, residential_ratio
                     FROM zip_crosswalk WHERE zip_code = ?1 ORDER BY rowid",
                )?;
                let rows = stmt
                    .query_map(params![zip], map_record)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)
    }

    /// Rows whose metro title lists `state_code` first among its states.
    pub async fn crosswalk_for_state(&self, state_code: &str) -> Result<Vec<CrosswalkRecord>, Error> {
        let state = state_code.to_ascii_uppercase();
        let pattern = format!("%, {state}%");
        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<CrosswalkRecord>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT zip_code, metro_code, metro_name, residential_ratio
                     FROM zip_crosswalk WHERE metro_name LIKE ?1 ORDER BY rowid",
                )?;
                let rows = stmt
                    .query_map(params![pattern], map_record)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        Ok(rows
            .into_iter()
            .filter(|r| super::state_from_metro_name(&r.metro_name).as_deref() == Some(state.as_str()))
            .collect())
    }
}

fn map_record(row: &tokio_rusqlite::rusqlite::Row<'_>) -> tokio_rusqlite::rusqlite::Result<CrosswalkRecord> {
    Ok(CrosswalkRecord {
        zip_code: row.get(0)?,
        metro_code: row.get(1)?,
        metro_name: row.get(2)?,
        residential_ratio: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::LocationResolver;

    fn rec(zip: &str, code: &str, name: &str, ratio: f64) -> CrosswalkRecord {
        CrosswalkRecord {
            zip_code: zip.into(),
            metro_code: code.into(),
            metro_name: name.into(),
            residential_ratio: ratio,
        }
    }

    async fn seeded() -> Store {
        let db = Store::open_in_memory().await.unwrap();
        db.load_crosswalk(&[
            rec("90210", "31080", "Los Angeles-Long Beach-Anaheim, CA", 1.0),
            rec("92101", "41740", "San Diego-Chula Vista-Carlsbad, CA", 1.0),
            rec("95814", "40900", "Sacramento-Roseville-Folsom, CA", 0.95),
            rec("95815", "40900", "Sacramento-Roseville-Folsom, CA", 0.4),
            rec("12345", "10580", "Albany-Schenectady-Troy, NY", 0.7),
            rec("12345", "46540", "Utica-Rome, NY", 0.3),
            rec("10001", "35620", "New York-Newark-Jersey City, NY-NJ-PA", 1.0),
        ])
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_load_is_upsert() {
        let db = seeded().await;
        db.load_crosswalk(&[rec("90210", "31080", "Los Angeles-Long Beach-Anaheim, CA", 0.8)])
            .await
            .unwrap();

        let rows = db.crosswalk_for_zip("90210").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].residential_ratio, 0.8);
    }

    #[tokio::test]
    async fn test_load_rejects_bad_ratio() {
        let db = Store::open_in_memory().await.unwrap();
        let result = db.load_crosswalk(&[rec("90210", "31080", "Los Angeles, CA", 1.5)]).await;
        assert!(matches!(result, Err(Error::InvalidParams(_))));
    }

    #[tokio::test]
    async fn test_resolve_split_zip() {
        let resolver = LocationResolver::new(seeded().await);
        let metro = resolver.resolve_metro("12345").await.unwrap().unwrap();

        assert_eq!(metro.metro_code, "10580");
        assert_eq!(metro.residential_ratio, 0.7);
        assert!(metro.is_split_zip);
        assert_eq!(resolver.records_for_zip("12345").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_unmapped_and_malformed() {
        let resolver = LocationResolver::new(seeded().await);
        assert!(resolver.resolve_metro("00000").await.unwrap().is_none());
        assert!(matches!(resolver.resolve_metro("9021").await, Err(Error::InvalidParams(_))));
    }

    #[tokio::test]
    async fn test_nearby_metros_same_state() {
        let resolver = LocationResolver::new(seeded().await);
        let nearby = resolver.nearby_metros("90210", 5).await.unwrap();
        let codes: Vec<_> = nearby.iter().map(|r| r.metro_code.as_str()).collect();

        assert_eq!(codes, vec!["41740", "40900"]);
        assert_eq!(nearby[1].residential_ratio, 0.95);

        let limited = resolver.nearby_metros("90210", 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_state_query_uses_first_listed_state() {
        let db = seeded().await;
        let ny = db.crosswalk_for_state("NY").await.unwrap();
        assert_eq!(ny.len(), 3);
        assert!(db.crosswalk_for_state("NJ").await.unwrap().is_empty());
    }
}

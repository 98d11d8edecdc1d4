//! ZIP code to metropolitan area resolution over a weighted crosswalk.
//!
//! A ZIP can straddle several metros. The primary metro is derived on every
//! lookup as the row with the largest residential ratio; nothing stores it.

pub mod crosswalk;

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::store::Store;

/// One crosswalk row: a share of a ZIP's residential addresses in one metro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrosswalkRecord {
    pub zip_code: String,
    pub metro_code: String,
    pub metro_name: String,
    pub residential_ratio: f64,
}

/// The primary metro for a ZIP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetroResolution {
    pub metro_code: String,
    pub metro_name: String,
    pub state_code: Option<String>,
    pub residential_ratio: f64,
    pub is_split_zip: bool,
}

/// Validate and normalize a five-digit ZIP.
///
/// # Errors
///
/// Returns `Error::InvalidParams` for anything other than exactly five ASCII digits.
pub fn validate_zip(zip: &str) -> Result<String, Error> {
    let zip = zip.trim();
    let zip_regex = Regex::new(r"^\d{5}$").map_err(|e| Error::Internal(e.to_string()))?;
    if zip_regex.is_match(zip) {
        Ok(zip.to_string())
    } else {
        Err(Error::InvalidParams(format!("invalid ZIP code '{zip}': expected 5 digits")))
    }
}

/// Derive the primary state from a CBSA title.
///
/// `"Los Angeles-Long Beach-Anaheim, CA"` gives `CA`; multi-state titles like
/// `"Washington-Arlington-Alexandria, DC-VA-MD-WV"` give the first listed state.
pub fn state_from_metro_name(name: &str) -> Option<String> {
    let (_, states) = name.rsplit_once(',')?;
    let first = states.trim().split('-').next()?.trim();
    let state = first.split_whitespace().next()?;
    (state.len() == 2 && state.bytes().all(|b| b.is_ascii_uppercase())).then(|| state.to_string())
}

/// Pick the highest-ratio record; ties go to the earliest record.
pub fn select_primary(records: &[CrosswalkRecord]) -> Option<MetroResolution> {
    let primary = records
        .iter()
        .fold(None::<&CrosswalkRecord>, |best, record| match best {
            Some(best) if best.residential_ratio >= record.residential_ratio => Some(best),
            _ => Some(record),
        })?;

    Some(MetroResolution {
        metro_code: primary.metro_code.clone(),
        metro_name: primary.metro_name.clone(),
        state_code: state_from_metro_name(&primary.metro_name),
        residential_ratio: primary.residential_ratio,
        is_split_zip: records.len() > 1,
    })
}

/// Rank candidate metros in the same state as `primary`.
///
/// Excludes the primary metro, keeps the highest-ratio row per metro code,
/// orders by ratio descending, and truncates to `limit`.
pub fn nearby_from(primary: &MetroResolution, candidates: Vec<CrosswalkRecord>, limit: usize) -> Vec<CrosswalkRecord> {
    let Some(state) = primary.state_code.as_deref() else {
        return Vec::new();
    };

    let mut best: HashMap<String, CrosswalkRecord> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for record in candidates {
        if record.metro_code == primary.metro_code
            || state_from_metro_name(&record.metro_name).as_deref() != Some(state)
        {
            continue;
        }
        match best.get_mut(&record.metro_code) {
            Some(existing) => {
                if record.residential_ratio > existing.residential_ratio {
                    *existing = record;
                }
            }
            None => {
                order.push(record.metro_code.clone());
                best.insert(record.metro_code.clone(), record);
            }
        }
    }

    let mut nearby: Vec<CrosswalkRecord> = order.into_iter().filter_map(|code| best.remove(&code)).collect();
    nearby.sort_by(|a, b| b.residential_ratio.total_cmp(&a.residential_ratio));
    nearby.truncate(limit);
    nearby
}

/// Resolver backed by the crosswalk table in the shared store.
#[derive(Debug, Clone)]
pub struct LocationResolver {
    store: Store,
}

impl LocationResolver {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Resolve a ZIP to its primary metro. `Ok(None)` means the ZIP is unmapped.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParams` for a malformed ZIP and `Database` if the
    /// crosswalk cannot be read.
    pub async fn resolve_metro(&self, zip: &str) -> Result<Option<MetroResolution>, Error> {
        let zip = validate_zip(zip)?;
        let records = self.store.crosswalk_for_zip(&zip).await?;
        let resolution = select_primary(&records);
        tracing::debug!(zip, rows = records.len(), metro = ?resolution.as_ref().map(|r| &r.metro_code), "resolved zip");
        Ok(resolution)
    }

    /// Other metros in the same state as the ZIP's primary metro.
    ///
    /// Empty when the ZIP is unmapped or its metro has no derivable state.
    pub async fn nearby_metros(&self, zip: &str, limit: usize) -> Result<Vec<CrosswalkRecord>, Error> {
        let Some(primary) = self.resolve_metro(zip).await? else {
            return Ok(Vec::new());
        };
        let Some(state) = primary.state_code.as_deref() else {
            return Ok(Vec::new());
        };
        let candidates = self.store.crosswalk_for_state(state).await?;
        Ok(nearby_from(&primary, candidates, limit))
    }

    /// All raw crosswalk rows for a ZIP.
    pub async fn records_for_zip(&self, zip: &str) -> Result<Vec<CrosswalkRecord>, Error> {
        let zip = validate_zip(zip)?;
        self.store.crosswalk_for_zip(&zip).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(zip: &str, code: &str, name: &str, ratio: f64) -> CrosswalkRecord {
        CrosswalkRecord {
            zip_code: zip.into(),
            metro_code: code.into(),
            metro_name: name.into(),
            residential_ratio: ratio,
        }
    }

    #[test]
    fn test_validate_zip() {
        assert_eq!(validate_zip(" 02139 ").unwrap(), "02139");
        assert!(validate_zip("2139").is_err());
        assert!(validate_zip("02139-1234").is_err());
        assert!(validate_zip("abcde").is_err());
        assert!(validate_zip("").is_err());
    }

    #[test]
    fn test_state_from_metro_name() {
        assert_eq!(state_from_metro_name("Los Angeles-Long Beach-Anaheim, CA").as_deref(), Some("CA"));
        assert_eq!(
            state_from_metro_name("Washington-Arlington-Alexandria, DC-VA-MD-WV").as_deref(),
            Some("DC")
        );
        assert_eq!(state_from_metro_name("Boston-Cambridge-Newton, MA-NH MSA").as_deref(), Some("MA"));
        assert_eq!(state_from_metro_name("No state here"), None);
    }

    #[test]
    fn test_split_zip_selects_highest_ratio() {
        let records = vec![
            rec("12345", "10000", "Small Metro, NY", 0.3),
            rec("12345", "20000", "Big Metro, NY", 0.7),
        ];
        let primary = select_primary(&records).unwrap();
        assert_eq!(primary.metro_code, "20000");
        assert!(primary.is_split_zip);
        assert_eq!(primary.state_code.as_deref(), Some("NY"));
    }

    #[test]
    fn test_single_record_not_split_and_tie_keeps_first() {
        let single = [rec("90210", "31080", "Los Angeles-Long Beach-Anaheim, CA", 1.0)];
        assert!(!select_primary(&single).unwrap().is_split_zip);

        let tied = [rec("1", "A", "A, TX", 0.5), rec("1", "B", "B, TX", 0.5)];
        assert_eq!(select_primary(&tied).unwrap().metro_code, "A");

        assert!(select_primary(&[]).is_none());
    }

    #[test]
    fn test_nearby_dedupes_excludes_and_orders() {
        let primary = select_primary(&[rec("75001", "19100", "Dallas-Fort Worth-Arlington, TX", 1.0)]).unwrap();
        let candidates = vec![
            rec("75001", "19100", "Dallas-Fort Worth-Arlington, TX", 1.0),
            rec("77001", "26420", "Houston-The Woodlands-Sugar Land, TX", 0.6),
            rec("77002", "26420", "Houston-The Woodlands-Sugar Land, TX", 0.9),
            rec("78701", "12420", "Austin-Round Rock-Georgetown, TX", 0.8),
            rec("73301", "99999", "Somewhere, OK-TX", 0.99),
            rec("78201", "41700", "San Antonio-New Braunfels, TX", 0.4),
        ];

        let nearby = nearby_from(&primary, candidates, 2);
        let codes: Vec<_> = nearby.iter().map(|r| r.metro_code.as_str()).collect();
        assert_eq!(codes, vec!["26420", "12420"]);
        assert_eq!(nearby[0].residential_ratio, 0.9);
    }
}

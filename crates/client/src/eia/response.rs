//! EIA API v2 response types and normalization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::lenient;

/// Raw envelope from any `.../data/` route.
#[derive(Debug, Deserialize)]
pub struct EiaApiResponse {
    #[serde(default)]
    pub response: Option<EiaBody>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct EiaBody {
    #[serde(default)]
    pub data: Vec<EiaRow>,
}

/// One observation. Electricity rows carry `stateid` and `price`; natural gas
/// and gasoline rows carry `duoarea` and `value`.
#[derive(Debug, Clone, Deserialize)]
pub struct EiaRow {
    pub period: String,
    #[serde(default)]
    pub stateid: Option<String>,
    #[serde(default)]
    pub duoarea: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub value: Option<f64>,
}

/// Latest price per area for one series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesPrices {
    /// Most recent period among the selected rows.
    pub period: Option<String>,
    pub prices: BTreeMap<String, f64>,
}

/// `YYYY-MM` or `YYYY-MM-DD` as a sortable tuple.
pub fn period_key(period: &str) -> Option<(i32, u32, u32)> {
    let mut parts = period.trim().split('-');
    let year = parts.next()?.parse().ok()?;
    let month = parts.next().map_or(Some(0), |m| m.parse().ok())?;
    let day = parts.next().map_or(Some(0), |d| d.parse().ok())?;
    Some((year, month, day))
}

/// Keep the numerically latest row per area.
///
/// `area` maps a row to its normalized area key (rows it rejects are skipped)
/// and `value` picks the price column.
pub fn latest_by_area(
    rows: Vec<EiaRow>, area: impl Fn(&EiaRow) -> Option<String>, value: impl Fn(&EiaRow) -> Option<f64>,
) -> SeriesPrices {
    let mut best: BTreeMap<String, ((i32, u32, u32), String, f64)> = BTreeMap::new();
    for row in rows {
        let (Some(key), Some(price), Some(when)) = (area(&row), value(&row), period_key(&row.period)) else {
            continue;
        };
        match best.get(&key) {
            Some((existing, _, _)) if *existing >= when => {}
            _ => {
                best.insert(key, (when, row.period, price));
            }
        }
    }

    let period = best
        .values()
        .max_by_key(|(when, _, _)| *when)
        .map(|(_, period, _)| period.clone());
    let prices = best.into_iter().map(|(key, (_, _, price))| (key, price)).collect();
    SeriesPrices { period, prices }
}

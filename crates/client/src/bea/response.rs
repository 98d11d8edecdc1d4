//! BEA Regional API response types and normalization.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::lenient;

/// Raw envelope from `GetData`.
#[derive(Debug, Deserialize)]
pub struct BeaApiResponse {
    #[serde(rename = "BEAAPI")]
    pub beaapi: BeaBody,
}

#[derive(Debug, Deserialize)]
pub struct BeaBody {
    #[serde(rename = "Results", default)]
    pub results: Option<BeaResults>,
    #[serde(rename = "Error", default)]
    pub error: Option<BeaError>,
}

#[derive(Debug, Deserialize)]
pub struct BeaResults {
    #[serde(rename = "Data", default)]
    pub data: Vec<BeaRow>,
    #[serde(rename = "Error", default)]
    pub error: Option<BeaError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BeaError {
    #[serde(rename = "APIErrorCode", default)]
    pub code: Option<String>,
    #[serde(rename = "APIErrorDescription", default)]
    pub description: Option<String>,
}

impl BeaError {
    /// BEA reports an empty selection as an error object rather than an empty list.
    pub fn is_no_data(&self) -> bool {
        self.description
            .as_deref()
            .is_some_and(|d| d.to_ascii_lowercase().contains("no data"))
    }

    pub fn message(&self) -> String {
        match (&self.code, &self.description) {
            (Some(code), Some(desc)) => format!("BEA error {code}: {desc}"),
            (None, Some(desc)) => desc.clone(),
            (Some(code), None) => format!("BEA error {code}"),
            (None, None) => "BEA error".to_string(),
        }
    }
}

/// One geography/line-code/year cell.
#[derive(Debug, Clone, Deserialize)]
pub struct BeaRow {
    #[serde(rename = "GeoFips")]
    pub geo_fips: String,
    #[serde(rename = "GeoName", default)]
    pub geo_name: String,
    #[serde(rename = "TimePeriod", default)]
    pub time_period: Option<String>,
    #[serde(rename = "DataValue", default, deserialize_with = "lenient::opt_f64")]
    pub data_value: Option<f64>,
}

/// What one line-code query produced.
#[derive(Debug)]
pub enum LineRows {
    Rows(Vec<BeaRow>),
    NoData,
}

impl BeaApiResponse {
    /// Split the envelope into rows, an empty selection, or a vendor error message.
    pub fn into_rows(self) -> Result<LineRows, String> {
        let body = self.beaapi;
        let error = body.error.or_else(|| body.results.as_ref().and_then(|r| r.error.clone()));

        if let Some(error) = error {
            return if error.is_no_data() { Ok(LineRows::NoData) } else { Err(error.message()) };
        }

        match body.results {
            Some(results) if !results.data.is_empty() => Ok(LineRows::Rows(results.data)),
            _ => Ok(LineRows::NoData),
        }
    }
}

/// Regional price parity for one geography. 100 is the national average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceParity {
    pub geo_id: String,
    pub name: String,
    pub overall: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goods: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub housing_rent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_services: Option<f64>,
    /// 1-based position by `overall` descending within the batch.
    pub rank: usize,
    pub year: i32,
}

/// Rows for each line code of one year's query.
#[derive(Debug, Default)]
pub struct YearRows {
    pub overall: Vec<BeaRow>,
    pub goods: Vec<BeaRow>,
    pub housing_rent: Vec<BeaRow>,
    pub other_services: Vec<BeaRow>,
}

const US_TOTAL_FIPS: &str = "00000";

fn by_geo(rows: Vec<BeaRow>) -> HashMap<String, f64> {
    rows.into_iter()
        .filter_map(|row| row.data_value.map(|v| (row.geo_fips, v)))
        .collect()
}

/// Bucket rows by geography and rank the batch.
///
/// Geographies appear in the order of the overall rows. A geography without
/// an overall value is dropped; missing component values stay None.
pub fn assemble(rows: YearRows, year: i32) -> Vec<PriceParity> {
    let goods = by_geo(rows.goods);
    let housing_rent = by_geo(rows.housing_rent);
    let other_services = by_geo(rows.other_services);

    let mut seen = std::collections::HashSet::new();
    let entries = rows
        .overall
        .into_iter()
        .filter(|row| row.geo_fips != US_TOTAL_FIPS)
        .filter_map(|row| {
            let overall = row.data_value?;
            if !seen.insert(row.geo_fips.clone()) {
                return None;
            }
            Some(PriceParity {
                goods: goods.get(&row.geo_fips).copied(),
                housing_rent: housing_rent.get(&row.geo_fips).copied(),
                other_services: other_services.get(&row.geo_fips).copied(),
                geo_id: row.geo_fips,
                name: row.geo_name,
                overall,
                rank: 0,
                year,
            })
        })
        .collect();

    rank(entries)
}

/// Sort by `overall` descending and assign 1-based ranks. Ties keep input order.
pub fn rank(mut entries: Vec<PriceParity>) -> Vec<PriceParity> {
    entries.sort_by(|a, b| b.overall.total_cmp(&a.overall));
    for (idx, entry) in entries.iter_mut().enumerate() {
        entry.rank = idx + 1;
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fips: &str, name: &str, value: Option<f64>) -> BeaRow {
        BeaRow { geo_fips: fips.into(), geo_name: name.into(), time_period: Some("2022".into()), data_value: value }
    }

    fn entry(geo: &str, overall: f64) -> PriceParity {
        PriceParity {
            geo_id: geo.into(),
            name: geo.into(),
            overall,
            goods: None,
            housing_rent: None,
            other_services: None,
            rank: 0,
            year: 2022,
        }
    }

    #[test]
    fn test_rank_is_descending_and_stable() {
        let ranked = rank(vec![entry("a", 110.0), entry("b", 95.0), entry("c", 100.0)]);
        let rank_of = |geo: &str| ranked.iter().find(|e| e.geo_id == geo).unwrap().rank;
        assert_eq!([rank_of("a"), rank_of("b"), rank_of("c")], [1, 3, 2]);

        let tied = rank(vec![entry("x", 100.0), entry("y", 100.0)]);
        assert_eq!(tied[0].geo_id, "x");
        assert_eq!(tied[1].rank, 2);
    }

    #[test]
    fn test_assemble_buckets_components() {
        let rows = YearRows {
            overall: vec![
                row("00000", "United States", Some(100.0)),
                row("06000", "California", Some(112.6)),
                row("28000", "Mississippi", Some(87.8)),
                row("11000", "District of Columbia", None),
            ],
            goods: vec![row("06000", "California", Some(104.2))],
            housing_rent: vec![row("06000", "California", Some(151.0)), row("28000", "Mississippi", Some(64.4))],
            other_services: vec![],
        };

        let entries = assemble(rows, 2022);
        assert_eq!(entries.len(), 2);

        let ca = &entries[0];
        assert_eq!(ca.geo_id, "06000");
        assert_eq!(ca.rank, 1);
        assert_eq!(ca.goods, Some(104.2));
        assert_eq!(ca.other_services, None);

        let ms = &entries[1];
        assert_eq!(ms.goods, None);
        assert_eq!(ms.housing_rent, Some(64.4));
    }

    #[test]
    fn test_into_rows_variants() {
        let data: BeaApiResponse = serde_json::from_value(serde_json::json!({
            "BEAAPI": {"Results": {"Data": [{"GeoFips": "06000", "GeoName": "California", "DataValue": "112.6"}]}}
        }))
        .unwrap();
        assert!(matches!(data.into_rows(), Ok(LineRows::Rows(rows)) if rows[0].data_value == Some(112.6)));

        let no_data: BeaApiResponse = serde_json::from_value(serde_json::json!({
            "BEAAPI": {"Results": {"Error": {"APIErrorCode": "101", "APIErrorDescription": "No data exists for the requested year"}}}
        }))
        .unwrap();
        assert!(matches!(no_data.into_rows(), Ok(LineRows::NoData)));

        let bad_key: BeaApiResponse = serde_json::from_value(serde_json::json!({
            "BEAAPI": {"Error": {"APIErrorCode": "3", "APIErrorDescription": "The UserId provided is not valid"}}
        }))
        .unwrap();
        assert!(bad_key.into_rows().unwrap_err().contains("not valid"));
    }
}

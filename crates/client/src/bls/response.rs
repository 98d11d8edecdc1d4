//! BLS public API v2 response types and normalization.

use serde::{Deserialize, Serialize};

use crate::lenient;

pub const REQUEST_SUCCEEDED: &str = "REQUEST_SUCCEEDED";

/// Raw envelope from `timeseries/data/`.
#[derive(Debug, Deserialize)]
pub struct BlsApiResponse {
    pub status: String,
    #[serde(default)]
    pub message: Vec<String>,
    #[serde(rename = "Results", default)]
    pub results: Option<BlsResults>,
}

#[derive(Debug, Deserialize)]
pub struct BlsResults {
    #[serde(default)]
    pub series: Vec<BlsSeries>,
}

#[derive(Debug, Deserialize)]
pub struct BlsSeries {
    #[serde(rename = "seriesID")]
    pub series_id: String,
    #[serde(default)]
    pub data: Vec<BlsPoint>,
}

#[derive(Debug, Deserialize)]
pub struct BlsPoint {
    pub year: String,
    pub period: String,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub value: Option<f64>,
}

/// One monthly observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpiPoint {
    pub year: i32,
    pub month: u32,
    pub value: f64,
}

/// Monthly points for one series, ascending by `(year, month)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpiSeries {
    pub series_id: String,
    pub points: Vec<CpiPoint>,
}

impl CpiSeries {
    /// The point with the numerically greatest `(year, month)`.
    pub fn latest(&self) -> Option<CpiPoint> {
        self.points.iter().copied().max_by_key(|p| (p.year, p.month))
    }
}

/// Parse `"M01"`..`"M12"`. `M13` is the annual average and is rejected.
pub fn parse_month(period: &str) -> Option<u32> {
    let month: u32 = period.strip_prefix('M')?.parse().ok()?;
    (1..=12).contains(&month).then_some(month)
}

impl From<BlsSeries> for CpiSeries {
    fn from(raw: BlsSeries) -> Self {
        let mut points: Vec<CpiPoint> = raw
            .data
            .into_iter()
            .filter_map(|p| {
                Some(CpiPoint { year: p.year.trim().parse().ok()?, month: parse_month(&p.period)?, value: p.value? })
            })
            .collect();
        points.sort_by_key(|p| (p.year, p.month));
        CpiSeries { series_id: raw.series_id, points }
    }
}

//! HUD USER FMR API response types and normalization.

use serde::{Deserialize, Serialize};

use crate::lenient;

/// Raw envelope from `fmr/data/{entityid}`.
#[derive(Debug, Deserialize)]
pub struct FmrDataResponse {
    pub data: FmrData,
}

#[derive(Debug, Deserialize)]
pub struct FmrData {
    #[serde(default)]
    pub metro_name: Option<String>,
    #[serde(default)]
    pub area_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_year")]
    pub year: Option<i32>,
    #[serde(default)]
    pub basicdata: Option<BasicData>,
}

/// Small-area responses carry one row per ZIP plus an `MSA level` row;
/// other areas carry a single object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BasicData {
    Rows(Vec<BedroomRow>),
    Single(BedroomRow),
}

#[derive(Debug, Clone, Deserialize)]
pub struct BedroomRow {
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(rename = "Efficiency", default, deserialize_with = "lenient::opt_f64")]
    pub efficiency: Option<f64>,
    #[serde(rename = "One-Bedroom", default, deserialize_with = "lenient::opt_f64")]
    pub one_bedroom: Option<f64>,
    #[serde(rename = "Two-Bedroom", default, deserialize_with = "lenient::opt_f64")]
    pub two_bedroom: Option<f64>,
    #[serde(rename = "Three-Bedroom", default, deserialize_with = "lenient::opt_f64")]
    pub three_bedroom: Option<f64>,
    #[serde(rename = "Four-Bedroom", default, deserialize_with = "lenient::opt_f64")]
    pub four_bedroom: Option<f64>,
}

impl BedroomRow {
    /// Rents for 0..=4 bedrooms with missing sizes as 0.
    pub fn rents(&self) -> [f64; 5] {
        [self.efficiency, self.one_bedroom, self.two_bedroom, self.three_bedroom, self.four_bedroom]
            .map(|rent| rent.unwrap_or(0.0))
    }
}

const MSA_LEVEL: &str = "MSA level";

/// The row to use for `zip` and whether it is ZIP-specific.
pub fn select_row<'a>(basic: &'a BasicData, zip: &str) -> Option<(&'a BedroomRow, bool)> {
    match basic {
        BasicData::Single(row) => Some((row, false)),
        BasicData::Rows(rows) => {
            let zip_row = rows.iter().find(|r| r.zip_code.as_deref().map(str::trim) == Some(zip));
            if let Some(row) = zip_row {
                return Some((row, true));
            }
            rows.iter()
                .find(|r| r.zip_code.as_deref().is_some_and(|z| z.eq_ignore_ascii_case(MSA_LEVEL)))
                .map(|row| (row, false))
        }
    }
}

/// Raw envelope from `fmr/statedata/{ST}`.
#[derive(Debug, Deserialize)]
pub struct StateDataResponse {
    pub data: StateData,
}

#[derive(Debug, Deserialize)]
pub struct StateData {
    #[serde(default, deserialize_with = "lenient::opt_year")]
    pub year: Option<i32>,
    #[serde(default)]
    pub metroareas: Vec<MetroAreaRow>,
}

#[derive(Debug, Deserialize)]
pub struct MetroAreaRow {
    pub metro_name: String,
    /// Entity id such as `METRO31080M31080`.
    pub code: String,
    #[serde(flatten)]
    pub rents: BedroomRow,
}

/// Fair market rents for the metro a ZIP resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FairMarketRent {
    pub zip_code: String,
    pub metro_code: String,
    pub metro_name: String,
    /// Index is the bedroom count.
    pub rents_by_bedroom: [f64; 5],
    pub is_small_area_fmr: bool,
    pub is_split_zip: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetroRent {
    pub metro_code: String,
    pub metro_name: String,
    pub rents_by_bedroom: [f64; 5],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRents {
    pub state_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub metros: Vec<MetroRent>,
}

/// `METRO31080M31080` gives `31080`; other codes pass through.
pub fn cbsa_from_entity(code: &str) -> String {
    code.strip_prefix("METRO")
        .and_then(|rest| rest.split('M').next())
        .filter(|cbsa| !cbsa.is_empty())
        .unwrap_or(code)
        .to_string()
}

impl StateRents {
    pub fn from_raw(state_code: &str, raw: StateData) -> Self {
        let metros = raw
            .metroareas
            .into_iter()
            .map(|m| MetroRent {
                metro_code: cbsa_from_entity(&m.code),
                metro_name: m.metro_name,
                rents_by_bedroom: m.rents.rents(),
            })
            .collect();
        Self { state_code: state_code.to_string(), year: raw.year, metros }
    }
}

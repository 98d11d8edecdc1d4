//! Static state geography: FIPS codes, census regions, and PADD groups.
//!
//! Covers the 50 states plus DC. Territories are absent;
//! lookups for them return None and callers fall back to national data.

use serde::{Deserialize, Serialize};

/// Census region used to pick a regional CPI series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CensusRegion {
    Northeast,
    Midwest,
    South,
    West,
}

impl CensusRegion {
    pub const ALL: [CensusRegion; 4] =
        [CensusRegion::Northeast, CensusRegion::Midwest, CensusRegion::South, CensusRegion::West];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Northeast => "northeast",
            Self::Midwest => "midwest",
            Self::South => "south",
            Self::West => "west",
        }
    }

    /// CPI-U all items, not seasonally adjusted, for the region.
    pub const fn cpi_series_id(self) -> &'static str {
        match self {
            Self::Northeast => "CUUR0100SA0",
            Self::Midwest => "CUUR0200SA0",
            Self::South => "CUUR0300SA0",
            Self::West => "CUUR0400SA0",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|region| region.as_str().eq_ignore_ascii_case(value))
    }
}

/// CPI-U all items, not seasonally adjusted, U.S. city average.
pub const NATIONAL_CPI_SERIES: &str = "CUUR0000SA0";

/// Petroleum Administration for Defense District, as used for gasoline prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Padd {
    /// East Coast
    R10,
    /// Midwest
    R20,
    /// Gulf Coast
    R30,
    /// Rocky Mountain
    R40,
    /// West Coast
    R50,
}

impl Padd {
    pub const ALL: [Padd; 5] = [Padd::R10, Padd::R20, Padd::R30, Padd::R40, Padd::R50];

    pub const fn code(self) -> &'static str {
        match self {
            Self::R10 => "R10",
            Self::R20 => "R20",
            Self::R30 => "R30",
            Self::R40 => "R40",
            Self::R50 => "R50",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|padd| padd.code() == code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateInfo {
    pub code: &'static str,
    pub fips: &'static str,
    pub region: CensusRegion,
    pub padd: Padd,
}

const fn st(code: &'static str, fips: &'static str, region: CensusRegion, padd: Padd) -> StateInfo {
    StateInfo { code, fips, region, padd }
}

use CensusRegion::{Midwest, Northeast, South, West};
use Padd::{R10, R20, R30, R40, R50};

pub const STATES: [StateInfo; 51] = [
    st("AL", "01", South, R30),
    st("AK", "02", West, R50),
    st("AZ", "04", West, R50),
    st("AR", "05", South, R30),
    st("CA", "06", West, R50),
    st("CO", "08", West, R40),
    st("CT", "09", Northeast, R10),
    st("DE", "10", South, R10),
    st("DC", "11", South, R10),
    st("FL", "12", South, R10),
    st("GA", "13", South, R10),
    st("HI", "15", West, R50),
    st("ID", "16", West, R40),
    st("IL", "17", Midwest, R20),
    st("IN", "18", Midwest, R20),
    st("IA", "19", Midwest, R20),
    st("KS", "20", Midwest, R20),
    st("KY", "21", South, R20),
    st("LA", "22", South, R30),
    st("ME", "23", Northeast, R10),
    st("MD", "24", South, R10),
    st("MA", "25", Northeast, R10),
    st("MI", "26", Midwest, R20),
    st("MN", "27", Midwest, R20),
    st("MS", "28", South, R30),
    st("MO", "29", Midwest, R20),
    st("MT", "30", West, R40),
    st("NE", "31", Midwest, R20),
    st("NV", "32", West, R50),
    st("NH", "33", Northeast, R10),
    st("NJ", "34", Northeast, R10),
    st("NM", "35", West, R30),
    st("NY", "36", Northeast, R10),
    st("NC", "37", South, R10),
    st("ND", "38", Midwest, R20),
    st("OH", "39", Midwest, R20),
    st("OK", "40", South, R20),
    st("OR", "41", West, R50),
    st("PA", "42", Northeast, R10),
    st("RI", "44", Northeast, R10),
    st("SC", "45", South, R10),
    st("SD", "46", Midwest, R20),
    st("TN", "47", South, R20),
    st("TX", "48", South, R30),
    st("UT", "49", West, R40),
    st("VT", "50", Northeast, R10),
    st("VA", "51", South, R10),
    st("WA", "53", West, R50),
    st("WV", "54", South, R10),
    st("WI", "55", Midwest, R20),
    st("WY", "56", West, R40),
];

/// Look up a state by its two-letter postal code (case-insensitive).
pub fn by_code(code: &str) -> Option<&'static StateInfo> {
    let code = code.trim();
    STATES.iter().find(|state| state.code.eq_ignore_ascii_case(code))
}

/// Look up a state by FIPS, accepting `"06"` or the BEA form `"06000"`.
pub fn by_fips(fips: &str) -> Option<&'static StateInfo> {
    let fips = fips.trim();
    let prefix = match fips.len() {
        2 => fips,
        5 if fips.ends_with("000") => &fips[..2],
        _ => return None,
    };
    STATES.iter().find(|state| state.fips == prefix)
}

/// Accept either a postal code or a FIPS code.
pub fn lookup(value: &str) -> Option<&'static StateInfo> {
    by_code(value).or_else(|| by_fips(value))
}

pub fn states_in_region(region: CensusRegion) -> impl Iterator<Item = &'static StateInfo> {
    STATES.iter().filter(move |state| state.region == region)
}

/// Normalize a two-letter code to uppercase if it names a known state.
pub fn normalize_state_code(value: &str) -> Option<&'static str> {
    by_code(value).map(|state| state.code)
}

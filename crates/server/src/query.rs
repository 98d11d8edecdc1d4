//! Typed queries behind each tool's `type` discriminator.
//!
//! Parsing is synchronous and never touches the network, so malformed input
//! fails before any fetcher runs.

use costmap_client::SeriesTarget;
use costmap_core::geo::CensusRegion;
use costmap_core::{Error, Source};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceParityQuery {
    States { year: Option<i32> },
    Metros { year: Option<i32> },
    State { state: String, year: Option<i32> },
    Metro { cbsa: String, year: Option<i32> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceIndexQuery {
    National,
    State(String),
    Region(CensusRegion),
    Timeseries(SeriesTarget),
    Regions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnergyQuery {
    All,
    State(String),
    Utility,
    UtilityState(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RentQuery {
    Zip(String),
    State(String),
    Batch(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheAdminQuery {
    Invalidate { source: Option<Source>, key: Option<String> },
    Sweep,
    Count { source: Option<Source> },
}

/// A non-blank string parameter required by the chosen query type.
pub fn required(value: Option<&str>, field: &str, kind: &str) -> Result<String, Error> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or_else(|| Error::InvalidParams(format!("'{field}' is required for type '{kind}'")))
}

pub fn unknown_type(kind: &str, expected: &[&str]) -> Error {
    Error::InvalidParams(format!("unknown type '{kind}': expected one of {}", expected.join(", ")))
}

pub fn parse_region(value: &str) -> Result<CensusRegion, Error> {
    CensusRegion::parse(value).ok_or_else(|| {
        Error::InvalidParams(format!("unknown region '{value}': expected northeast, midwest, south, or west"))
    })
}

pub fn parse_source(value: Option<&str>) -> Result<Option<Source>, Error> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::parse::<Source>).transpose()
}

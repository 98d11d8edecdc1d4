//! Regional price parity client (BEA Regional dataset).
//!
//! ### API
//!
//! - **Endpoint**: `GET {base}?method=GetData&datasetname=Regional`
//! - **Authentication**: `UserID` query parameter.
//! - **Tables**: `SARPP` for states, `MARPP` for metro areas.
//! - **Line codes**: 1 all items, 2 goods, 3 housing rents, 5 other services.
//! - **Year fallback**: a year without overall rows retries the prior year once.
//! - **Ranking**: over the full batch, `overall` descending, ties by input order.

pub mod response;

pub use response::{BeaApiResponse, PriceParity};

use std::sync::Arc;

use chrono::Datelike;
use costmap_core::{AppConfig, Error, Source, Store, geo};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::fetched::{Fetched, read_through};
use crate::transport::{ApiRequest, Transport, fetch_json};
use response::{LineRows, YearRows};

/// First year BEA publishes price parities for.
pub const FIRST_YEAR: i32 = 2008;

/// Geography level of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoLevel {
    States,
    Metros,
}

impl GeoLevel {
    fn table(self) -> &'static str {
        match self {
            Self::States => "SARPP",
            Self::Metros => "MARPP",
        }
    }

    fn geo_fips(self) -> &'static str {
        match self {
            Self::States => "STATE",
            Self::Metros => "MSA",
        }
    }

    fn cache_key(self, year: i32) -> String {
        match self {
            Self::States => format!("states:{year}"),
            Self::Metros => format!("metros:{year}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum LineCode {
    Overall = 1,
    Goods = 2,
    HousingRent = 3,
    OtherServices = 5,
}

/// A ranked batch for one geography level.
///
/// `data_year` differs from `requested_year` when the prior-year fallback was used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceParityBatch {
    pub level: GeoLevel,
    pub requested_year: i32,
    pub data_year: i32,
    pub entries: Vec<PriceParity>,
}

/// One geography looked up within its ranked batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceParityLookup {
    #[serde(flatten)]
    pub entry: PriceParity,
    pub requested_year: i32,
    pub data_year: i32,
    /// Batch size the rank is relative to.
    pub ranked_of: usize,
}

/// BEA price parity client.
#[derive(Debug, Clone)]
pub struct PriceParityClient {
    transport: Arc<dyn Transport>,
    store: Store,
    config: Arc<AppConfig>,
}

impl PriceParityClient {
    pub fn new(transport: Arc<dyn Transport>, store: Store, config: Arc<AppConfig>) -> Self {
        Self { transport, store, config }
    }

    /// Every state, ranked.
    pub async fn states(&self, year: Option<i32>) -> Result<Fetched<PriceParityBatch>, Error> {
        self.batch(GeoLevel::States, year).await
    }

    /// Every metro area, ranked.
    pub async fn metros(&self, year: Option<i32>) -> Result<Fetched<PriceParityBatch>, Error> {
        self.batch(GeoLevel::Metros, year).await
    }

    /// One state by postal code or FIPS, ranked among all states.
    pub async fn state(&self, state: &str, year: Option<i32>) -> Result<Fetched<PriceParityLookup>, Error> {
        let info = geo::lookup(state)
            .ok_or_else(|| Error::InvalidParams(format!("unknown state '{state}': expected a postal code or FIPS")))?;
        let geo_id = format!("{}000", info.fips);
        self.batch(GeoLevel::States, year)
            .await?
            .try_map(|batch| lookup(batch, &geo_id, info.code))
    }

    /// One metro area by 5-digit CBSA code, ranked among all metros.
    pub async fn metro(&self, cbsa: &str, year: Option<i32>) -> Result<Fetched<PriceParityLookup>, Error> {
        let cbsa = cbsa.trim();
        if cbsa.len() != 5 || !cbsa.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidParams(format!("invalid metro code '{cbsa}': expected 5-digit CBSA")));
        }
        self.batch(GeoLevel::Metros, year)
            .await?
            .try_map(|batch| lookup(batch, cbsa, cbsa))
    }

    async fn batch(&self, level: GeoLevel, year: Option<i32>) -> Result<Fetched<PriceParityBatch>, Error> {
        let year = self.resolve_year(year)?;
        read_through(&self.store, Source::PriceParity, &level.cache_key(year), || self.load(level, year)).await
    }

    fn resolve_year(&self, year: Option<i32>) -> Result<i32, Error> {
        let current = self.store.now().year();
        let year = year.or(self.config.price_parity_year).unwrap_or(current - 2);
        if !(FIRST_YEAR..=current).contains(&year) {
            return Err(Error::InvalidParams(format!("year {year} out of range {FIRST_YEAR}..={current}")));
        }
        Ok(year)
    }

    async fn load(&self, level: GeoLevel, requested: i32) -> Result<PriceParityBatch, Error> {
        if let Some(entries) = self.query_year(level, requested).await? {
            return Ok(PriceParityBatch { level, requested_year: requested, data_year: requested, entries });
        }

        let prior = requested - 1;
        tracing::warn!(table = level.table(), requested, prior, "no price parity rows for year, retrying prior year");
        match self.query_year(level, prior).await? {
            Some(entries) => Ok(PriceParityBatch { level, requested_year: requested, data_year: prior, entries }),
            None => Err(Error::NotFound(format!(
                "no price parity data for {} in {requested} or {prior}",
                level.table()
            ))),
        }
    }

    /// All four line codes for one year. None when there are no overall rows.
    async fn query_year(&self, level: GeoLevel, year: i32) -> Result<Option<Vec<PriceParity>>, Error> {
        let (overall, goods, housing_rent, other_services) = tokio::try_join!(
            self.query_line(level, LineCode::Overall, year),
            self.query_line(level, LineCode::Goods, year),
            self.query_line(level, LineCode::HousingRent, year),
            self.query_line(level, LineCode::OtherServices, year),
        )?;

        if overall.is_empty() {
            return Ok(None);
        }

        let entries = response::assemble(YearRows { overall, goods, housing_rent, other_services }, year);
        Ok((!entries.is_empty()).then_some(entries))
    }

    async fn query_line(&self, level: GeoLevel, line: LineCode, year: i32) -> Result<Vec<response::BeaRow>, Error> {
        let key = self.config.require_bea_api_key()?;
        let mut url = Url::parse(&self.config.bea_base_url)
            .map_err(|e| Error::Internal(format!("invalid BEA base URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("UserID", key)
            .append_pair("method", "GetData")
            .append_pair("datasetname", "Regional")
            .append_pair("TableName", level.table())
            .append_pair("LineCode", &(line as u8).to_string())
            .append_pair("GeoFips", level.geo_fips())
            .append_pair("Year", &year.to_string())
            .append_pair("ResultFormat", "json");

        let raw: BeaApiResponse = fetch_json(self.transport.as_ref(), Source::PriceParity, ApiRequest::get(url)).await?;
        match raw.into_rows() {
            Ok(LineRows::Rows(rows)) => Ok(rows),
            Ok(LineRows::NoData) => Ok(Vec::new()),
            Err(message) => Err(Error::upstream(Source::PriceParity.as_str(), message)),
        }
    }
}

fn lookup(batch: PriceParityBatch, geo_id: &str, label: &str) -> Result<PriceParityLookup, Error> {
    let ranked_of = batch.entries.len();
    let entry = batch
        .entries
        .into_iter()
        .find(|e| e.geo_id == geo_id)
        .ok_or_else(|| Error::NotFound(format!("no price parity data for {label} in {}", batch.data_year)))?;
    Ok(PriceParityLookup { entry, requested_year: batch.requested_year, data_year: batch.data_year, ranked_of })
}

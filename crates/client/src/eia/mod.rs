//! Retail energy price client (EIA API v2).
//!
//! ### API
//!
//! - **Electricity**: `electricity/retail-sales`, residential sector, cents/kWh, by state.
//! - **Natural gas**: `natural-gas/pri/sum`, residential process `PRS`, $/Mcf, duoarea `S{ST}`.
//! - **Gasoline**: `petroleum/pri/gnd`, regular retail `EPMR`, $/gal, weekly, by PADD.
//! - **Authentication**: `api_key` query parameter, checked only on a cache miss.
//! - **Composition**: the three series are fetched concurrently and settle
//!   independently; see [`compose`].

pub mod compose;
pub mod response;

pub use compose::{EnergyIndices, EnergyOverview, EnergyPriceRecord, EnergySeries, NationalAverages, SubFetch};
pub use response::SeriesPrices;

use std::sync::Arc;

use costmap_core::geo::{self, Padd};
use costmap_core::{AppConfig, Error, Source, Store};
use serde::Serialize;
use url::Url;

use crate::fetched::{Fetched, read_through};
use crate::transport::{ApiRequest, Transport, fetch_json};
use response::{EiaApiResponse, EiaRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Series {
    Electricity,
    NaturalGas,
    Gasoline,
}

impl Series {
    fn route(self) -> &'static str {
        match self {
            Self::Electricity => "electricity/retail-sales/data/",
            Self::NaturalGas => "natural-gas/pri/sum/data/",
            Self::Gasoline => "petroleum/pri/gnd/data/",
        }
    }

    fn cache_key(self) -> &'static str {
        match self {
            Self::Electricity => "series:electricity",
            Self::NaturalGas => "series:natural-gas",
            Self::Gasoline => "series:gasoline",
        }
    }

    fn query(self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("sort[0][column]", "period".to_string()), ("sort[0][direction]", "desc".to_string())];
        match self {
            Self::Electricity => {
                pairs.extend([
                    ("frequency", "monthly".to_string()),
                    ("data[0]", "price".to_string()),
                    ("facets[sectorid][]", "RES".to_string()),
                    ("length", "1000".to_string()),
                ]);
            }
            Self::NaturalGas => {
                pairs.extend([
                    ("frequency", "monthly".to_string()),
                    ("data[0]", "value".to_string()),
                    ("facets[process][]", "PRS".to_string()),
                    ("length", "1000".to_string()),
                ]);
            }
            Self::Gasoline => {
                pairs.extend([
                    ("frequency", "weekly".to_string()),
                    ("data[0]", "value".to_string()),
                    ("facets[product][]", "EPMR".to_string()),
                    ("length", "50".to_string()),
                ]);
                pairs.extend(Padd::ALL.iter().map(|p| ("facets[duoarea][]", p.code().to_string())));
            }
        }
        pairs
    }

    /// Normalize raw rows to the latest price per state (or per PADD for gasoline).
    fn normalize(self, rows: Vec<EiaRow>) -> SeriesPrices {
        match self {
            Self::Electricity => response::latest_by_area(
                rows,
                |r| r.stateid.as_deref().and_then(geo::normalize_state_code).map(String::from),
                |r| r.price,
            ),
            Self::NaturalGas => response::latest_by_area(
                rows,
                |r| {
                    r.duoarea
                        .as_deref()
                        .and_then(|area| area.strip_prefix('S'))
                        .filter(|code| code.len() == 2)
                        .and_then(geo::normalize_state_code)
                        .map(String::from)
                },
                |r| r.value,
            ),
            Self::Gasoline => response::latest_by_area(
                rows,
                |r| r.duoarea.as_deref().and_then(Padd::from_code).map(|p| p.code().to_string()),
                |r| r.value,
            ),
        }
    }
}

/// Residential electricity rate for one state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilityRate {
    pub state_code: String,
    pub electricity_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilityRates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_average: Option<f64>,
    pub states: Vec<UtilityRate>,
}

/// Electricity plus natural gas for one state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUtilities {
    pub state_code: String,
    pub electricity_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natural_gas_price: Option<f64>,
    pub national_averages: NationalAverages,
    pub indices: EnergyIndices,
}

/// EIA energy price client.
#[derive(Debug, Clone)]
pub struct EnergyClient {
    transport: Arc<dyn Transport>,
    store: Store,
    config: Arc<AppConfig>,
}

impl EnergyClient {
    pub fn new(transport: Arc<dyn Transport>, store: Store, config: Arc<AppConfig>) -> Self {
        Self { transport, store, config }
    }

    /// Every state with electricity or gasoline data.
    pub async fn all(&self) -> Result<Fetched<EnergyOverview>, Error> {
        let (series, meta) = self.fetch_all().await;
        let overview = series.compose_all();
        if overview.states.is_empty() {
            return Err(series
                .into_primary_error()
                .unwrap_or_else(|| Error::NotFound("no energy price data available".into())));
        }
        Ok(meta.wrap(overview))
    }

    /// One state's record. Natural gas is optional.
    pub async fn state(&self, state: &str) -> Result<Fetched<EnergyPriceRecord>, Error> {
        let code = state_code(state)?;
        let (series, meta) = self.fetch_all().await;
        let national = series.national_averages();
        match series.compose_state(code, &national) {
            Some(record) => Ok(meta.wrap(record)),
            None => Err(series
                .into_primary_error()
                .unwrap_or_else(|| Error::NotFound(format!("no electricity or gasoline prices for {code}")))),
        }
    }

    /// Residential electricity rates for every state.
    pub async fn utility(&self) -> Result<Fetched<UtilityRates>, Error> {
        let electricity = self.series(Series::Electricity).await?;
        Ok(electricity.map(|prices| {
            let national_average = compose::mean(prices.prices.values().copied());
            let states = geo::STATES
                .iter()
                .filter_map(|s| {
                    let price = *prices.prices.get(s.code)?;
                    Some(UtilityRate {
                        state_code: s.code.to_string(),
                        electricity_price: price,
                        index: compose::index(Some(price), national_average),
                    })
                })
                .collect();
            UtilityRates { period: prices.period, national_average, states }
        }))
    }

    /// Electricity (required) and natural gas (optional) for one state.
    pub async fn utility_state(&self, state: &str) -> Result<Fetched<StateUtilities>, Error> {
        let code = state_code(state)?;
        let (electricity, natural_gas) =
            tokio::join!(self.series(Series::Electricity), self.series(Series::NaturalGas));
        let electricity = electricity?;

        let mut meta = FetchMeta::default();
        meta.record(Some(&electricity));
        let natural_gas: SubFetch<Fetched<SeriesPrices>> = natural_gas.into();
        meta.record(natural_gas.resolved());

        let series = EnergySeries {
            electricity: SubFetch::Resolved(electricity.data),
            natural_gas: natural_gas.map(|f| f.data),
            gasoline: SubFetch::Resolved(SeriesPrices::default()),
        };
        let national = series.national_averages();
        let electricity_price = series
            .electricity
            .resolved()
            .and_then(|p| p.prices.get(code).copied())
            .ok_or_else(|| Error::NotFound(format!("no electricity price for {code}")))?;
        let natural_gas_price = series.natural_gas.resolved().and_then(|p| p.prices.get(code).copied());

        Ok(meta.wrap(StateUtilities {
            state_code: code.to_string(),
            electricity_price,
            natural_gas_price,
            national_averages: NationalAverages { gasoline: None, ..national },
            indices: EnergyIndices {
                electricity: compose::index(Some(electricity_price), national.electricity),
                natural_gas: compose::index(natural_gas_price, national.natural_gas),
                gasoline: None,
            },
        }))
    }

    /// All three series concurrently, each settling on its own.
    async fn fetch_all(&self) -> (EnergySeries, FetchMeta) {
        let (electricity, natural_gas, gasoline) = tokio::join!(
            self.series(Series::Electricity),
            self.series(Series::NaturalGas),
            self.series(Series::Gasoline),
        );

        let parts: [SubFetch<Fetched<SeriesPrices>>; 3] = [electricity.into(), natural_gas.into(), gasoline.into()];
        let mut meta = FetchMeta::default();
        for (part, name) in parts.iter().zip(["electricity", "natural_gas", "gasoline"]) {
            meta.record(part.resolved());
            if let SubFetch::Failed(e) = part {
                tracing::warn!(series = name, error = %e, "energy sub-series failed");
            }
        }

        let [electricity, natural_gas, gasoline] = parts.map(|p| p.map(|f| f.data));
        (EnergySeries { electricity, natural_gas, gasoline }, meta)
    }

    async fn series(&self, series: Series) -> Result<Fetched<SeriesPrices>, Error> {
        read_through(&self.store, Source::Energy, series.cache_key(), || self.load(series)).await
    }

    async fn load(&self, series: Series) -> Result<SeriesPrices, Error> {
        let key = self.config.require_eia_api_key()?;
        let base = self.config.eia_base_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/{}", series.route()))
            .map_err(|e| Error::Internal(format!("invalid EIA base URL: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api_key", key);
            for (name, value) in series.query() {
                query.append_pair(name, &value);
            }
        }

        let raw: EiaApiResponse = fetch_json(self.transport.as_ref(), Source::Energy, ApiRequest::get(url)).await?;
        if let Some(error) = raw.error {
            return Err(Error::upstream(Source::Energy.as_str(), format!("EIA error: {error}")));
        }
        let rows = raw
            .response
            .ok_or_else(|| Error::upstream(Source::Energy.as_str(), "response body missing"))?
            .data;

        let prices = series.normalize(rows);
        if prices.prices.is_empty() {
            return Err(Error::upstream(Source::Energy.as_str(), format!("{} returned no usable rows", series.route())));
        }
        Ok(prices)
    }
}

fn state_code(state: &str) -> Result<&'static str, Error> {
    geo::normalize_state_code(state).ok_or_else(|| Error::InvalidParams(format!("unknown state code '{state}'")))
}

/// Cache metadata across several sub-fetches: cached only if every part
/// was a hit; age is the oldest hit.
#[derive(Debug, Default)]
struct FetchMeta {
    parts: usize,
    hits: usize,
    oldest: Option<i64>,
}

impl FetchMeta {
    fn record<T>(&mut self, part: Option<&Fetched<T>>) {
        self.parts += 1;
        if let Some(fetched) = part
            && fetched.cached
        {
            self.hits += 1;
            self.oldest = self.oldest.max(fetched.cache_age);
        }
    }

    fn wrap<T>(&self, data: T) -> Fetched<T> {
        let cached = self.parts > 0 && self.hits == self.parts;
        Fetched { data, cached, cache_age: if cached { self.oldest } else { None } }
    }
}

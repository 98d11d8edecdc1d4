//! Pure composition of the three energy series into per-state records.
//!
//! Every function here is total over the [`SubFetch`] outcomes: a failed or
//! missing series leaves its fields unset and never fails the record.

use costmap_core::Error;
use costmap_core::geo::{self, Padd, STATES};
use serde::Serialize;

use super::response::SeriesPrices;

/// Outcome of one independently fetched series.
#[derive(Debug)]
pub enum SubFetch<T> {
    Resolved(T),
    Failed(Error),
}

impl<T> SubFetch<T> {
    pub fn resolved(&self) -> Option<&T> {
        match self {
            Self::Resolved(value) => Some(value),
            Self::Failed(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SubFetch<U> {
        match self {
            Self::Resolved(value) => SubFetch::Resolved(f(value)),
            Self::Failed(e) => SubFetch::Failed(e),
        }
    }
}

impl<T> From<Result<T, Error>> for SubFetch<T> {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(value) => Self::Resolved(value),
            Err(e) => Self::Failed(e),
        }
    }
}

/// The three series as fetched for one request.
#[derive(Debug)]
pub struct EnergySeries {
    pub electricity: SubFetch<SeriesPrices>,
    pub natural_gas: SubFetch<SeriesPrices>,
    /// Keyed by PADD code.
    pub gasoline: SubFetch<SeriesPrices>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NationalAverages {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub electricity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natural_gas: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gasoline: Option<f64>,
}

/// State price relative to the national average, x100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyIndices {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub electricity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natural_gas: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gasoline: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyPriceRecord {
    pub state_code: String,
    /// Residential, cents per kWh.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub electricity_price: Option<f64>,
    /// Residential, dollars per thousand cubic feet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natural_gas_price: Option<f64>,
    /// Regular retail, dollars per gallon, from the state's PADD.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gasoline_price: Option<f64>,
    pub national_averages: NationalAverages,
    pub indices: EnergyIndices,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyOverview {
    pub states: Vec<EnergyPriceRecord>,
    pub national_averages: NationalAverages,
    /// Series that failed for this request.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unavailable: Vec<&'static str>,
}

fn state_price(series: &SubFetch<SeriesPrices>, state: &str) -> Option<f64> {
    series.resolved()?.prices.get(state).copied()
}

fn gasoline_price(series: &SubFetch<SeriesPrices>, state: &str) -> Option<f64> {
    let padd: Padd = geo::by_code(state)?.padd;
    series.resolved()?.prices.get(padd.code()).copied()
}

pub fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

pub fn index(value: Option<f64>, national: Option<f64>) -> Option<f64> {
    match (value, national) {
        (Some(v), Some(n)) if n != 0.0 => Some(v / n * 100.0),
        _ => None,
    }
}

impl EnergySeries {
    /// Means of the per-state values across every state with a value.
    pub fn national_averages(&self) -> NationalAverages {
        NationalAverages {
            electricity: mean(STATES.iter().filter_map(|s| state_price(&self.electricity, s.code))),
            natural_gas: mean(STATES.iter().filter_map(|s| state_price(&self.natural_gas, s.code))),
            gasoline: mean(STATES.iter().filter_map(|s| gasoline_price(&self.gasoline, s.code))),
        }
    }

    /// None when neither electricity nor gasoline is available for the state.
    pub fn compose_state(&self, state: &str, national: &NationalAverages) -> Option<EnergyPriceRecord> {
        let electricity_price = state_price(&self.electricity, state);
        let gasoline_price = gasoline_price(&self.gasoline, state);
        if electricity_price.is_none() && gasoline_price.is_none() {
            return None;
        }
        let natural_gas_price = state_price(&self.natural_gas, state);

        Some(EnergyPriceRecord {
            state_code: state.to_string(),
            electricity_price,
            natural_gas_price,
            gasoline_price,
            national_averages: *national,
            indices: EnergyIndices {
                electricity: index(electricity_price, national.electricity),
                natural_gas: index(natural_gas_price, national.natural_gas),
                gasoline: index(gasoline_price, national.gasoline),
            },
        })
    }

    pub fn compose_all(&self) -> EnergyOverview {
        let national_averages = self.national_averages();
        let states = STATES
            .iter()
            .filter_map(|s| self.compose_state(s.code, &national_averages))
            .collect();
        EnergyOverview { states, national_averages, unavailable: self.unavailable() }
    }

    pub fn unavailable(&self) -> Vec<&'static str> {
        [
            ("electricity", self.electricity.is_resolved()),
            ("natural_gas", self.natural_gas.is_resolved()),
            ("gasoline", self.gasoline.is_resolved()),
        ]
        .into_iter()
        .filter(|(_, ok)| !ok)
        .map(|(name, _)| name)
        .collect()
    }

    /// The error to report when no record could be composed at all.
    pub fn into_primary_error(self) -> Option<Error> {
        match (self.electricity, self.gasoline) {
            (SubFetch::Failed(e), _) | (_, SubFetch::Failed(e)) => Some(e),
            _ => None,
        }
    }
}

//! Upstream data feeds and their fixed TTL policy.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::Error;

const DAY_SECONDS: i64 = 24 * 60 * 60;

/// One of the external government data feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    /// Regional price parities (annual).
    PriceParity,
    /// Fair market rents (annual).
    FairMarketRent,
    /// Consumer price index (monthly).
    PriceIndex,
    /// Retail energy prices (monthly).
    Energy,
}

impl Source {
    pub const ALL: [Source; 4] = [Source::PriceParity, Source::FairMarketRent, Source::PriceIndex, Source::Energy];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PriceParity => "price-parity",
            Self::FairMarketRent => "fair-market-rent",
            Self::PriceIndex => "price-index",
            Self::Energy => "energy",
        }
    }

    /// Cache lifetime in seconds. Annual feeds keep for 30 days, monthly feeds for 7.
    pub const fn ttl_seconds(self) -> i64 {
        match self {
            Self::PriceParity | Self::FairMarketRent => 30 * DAY_SECONDS,
            Self::PriceIndex | Self::Energy => 7 * DAY_SECONDS,
        }
    }

    pub fn ttl(self) -> TimeDelta {
        TimeDelta::seconds(self.ttl_seconds())
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Source::ALL
            .into_iter()
            .find(|source| source.as_str() == value.trim())
            .ok_or_else(|| {
                Error::InvalidParams(format!(
                    "unknown source '{value}', expected one of price-parity, fair-market-rent, price-index, energy"
                ))
            })
    }
}

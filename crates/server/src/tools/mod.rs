//! MCP tool implementations.
//!
//! Each tool takes a `type` discriminator plus the parameters that type
//! needs, parses them into a typed query, and hands it to the
//! [`Aggregator`](crate::aggregator::Aggregator).

pub mod cache_admin;
pub mod energy_prices;
pub mod fair_market_rent;
pub mod price_index;
pub mod price_parity;

pub use cache_admin::CacheAdminParams;
pub use energy_prices::EnergyPricesParams;
pub use fair_market_rent::FairMarketRentParams;
pub use price_index::PriceIndexParams;
pub use price_parity::PriceParityParams;

fn default_client_id() -> String {
    crate::aggregator::ANONYMOUS.to_string()
}

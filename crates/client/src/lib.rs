//! Upstream feed clients for costmap.
//!
//! Each feed client normalizes one government statistics API, reads through
//! the shared cache, and reports whether its answer came from cache. All
//! network access goes through a [`Transport`], so tests can swap in
//! [`StubTransport`].

pub mod bea;
pub mod bls;
pub mod eia;
pub mod fetched;
pub mod hud;
pub mod lenient;
pub mod transport;

use std::sync::Arc;

use costmap_core::{AppConfig, Store};

pub use bea::{GeoLevel, PriceParity, PriceParityBatch, PriceParityClient, PriceParityLookup};
pub use bls::{PriceIndex, PriceIndexClient, PriceIndexSeries, SeriesTarget, StatePriceIndex};
pub use eia::{EnergyClient, EnergyOverview, EnergyPriceRecord, StateUtilities, SubFetch, UtilityRates};
pub use fetched::{Fetched, read_through};
pub use hud::{FairMarketRent, RentBatch, RentBatchItem, RentClient, StateRents};
pub use transport::{ApiRequest, HttpTransport, StubReply, StubTransport, Transport, TransportError};

/// The four feed clients sharing one transport, store, and config.
#[derive(Debug, Clone)]
pub struct Feeds {
    pub price_parity: PriceParityClient,
    pub rents: RentClient,
    pub price_index: PriceIndexClient,
    pub energy: EnergyClient,
}

impl Feeds {
    pub fn new(transport: Arc<dyn Transport>, store: Store, config: Arc<AppConfig>) -> Self {
        Self {
            price_parity: PriceParityClient::new(transport.clone(), store.clone(), config.clone()),
            rents: RentClient::new(transport.clone(), store.clone(), config.clone()),
            price_index: PriceIndexClient::new(transport.clone(), store.clone(), config.clone()),
            energy: EnergyClient::new(transport, store, config),
        }
    }
}

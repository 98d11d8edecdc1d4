//! Fair market rent client (HUD USER FMR API).
//!
//! ### API
//!
//! - **Endpoints**: `GET {base}/fmr/data/METRO{cbsa}M{cbsa}`, `GET {base}/fmr/statedata/{ST}`
//! - **Authentication**: bearer token.
//! - **ZIP lookups**: resolve the ZIP's primary metro first; an unmapped ZIP is NotFound.
//! - **Batches**: 1 to 20 ZIPs, fetched concurrently, errors reported per item.

pub mod response;

pub use response::{FairMarketRent, MetroRent, StateRents};

use std::sync::Arc;

use costmap_core::resolver::validate_zip;
use costmap_core::{AppConfig, Error, ErrorBody, LocationResolver, Source, Store, geo};
use serde::Serialize;
use tokio::task::JoinSet;
use url::Url;

use crate::fetched::{Fetched, read_through};
use crate::transport::{ApiRequest, Transport, fetch_json};
use response::{FmrDataResponse, StateDataResponse};

/// Largest accepted batch.
pub const MAX_BATCH: usize = 20;

/// Per-ZIP outcome inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RentBatchItem {
    pub zip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<FairMarketRent>,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RentBatch {
    pub items: Vec<RentBatchItem>,
    pub succeeded: usize,
    pub failed: usize,
}

/// HUD fair market rent client.
#[derive(Debug, Clone)]
pub struct RentClient {
    transport: Arc<dyn Transport>,
    store: Store,
    resolver: LocationResolver,
    config: Arc<AppConfig>,
}

impl RentClient {
    pub fn new(transport: Arc<dyn Transport>, store: Store, config: Arc<AppConfig>) -> Self {
        let resolver = LocationResolver::new(store.clone());
        Self { transport, store, resolver, config }
    }

    /// Rents for the metro a ZIP resolves to.
    pub async fn zip(&self, zip: &str) -> Result<Fetched<FairMarketRent>, Error> {
        let zip = validate_zip(zip)?;
        read_through(&self.store, Source::FairMarketRent, &format!("zip:{zip}"), || self.load_zip(&zip)).await
    }

    /// Metro-area rents for every metro in a state.
    pub async fn state(&self, state: &str) -> Result<Fetched<StateRents>, Error> {
        let code = geo::normalize_state_code(state)
            .ok_or_else(|| Error::InvalidParams(format!("unknown state code '{state}'")))?;
        read_through(&self.store, Source::FairMarketRent, &format!("state:{code}"), || self.load_state(code)).await
    }

    /// Independent lookups for up to [`MAX_BATCH`] ZIPs, in input order.
    ///
    /// One failing ZIP becomes an item-level error and never fails the batch.
    pub async fn batch(&self, zips: &[String]) -> Result<RentBatch, Error> {
        if zips.is_empty() {
            return Err(Error::InvalidParams("zips must contain at least one ZIP code".into()));
        }
        if zips.len() > MAX_BATCH {
            return Err(Error::InvalidParams(format!("at most {MAX_BATCH} ZIP codes per batch, got {}", zips.len())));
        }

        let mut tasks = JoinSet::new();
        for (idx, zip) in zips.iter().cloned().enumerate() {
            let client = self.clone();
            tasks.spawn(async move {
                let result = client.zip(&zip).await;
                (idx, zip, result)
            });
        }

        let mut slots: Vec<Option<RentBatchItem>> = vec![None; zips.len()];
        while let Some(joined) = tasks.join_next().await {
            let (idx, zip, result) = joined.map_err(|e| Error::Internal(format!("rent batch task failed: {e}")))?;
            let item = match result {
                Ok(fetched) => RentBatchItem { zip, data: Some(fetched.data), cached: fetched.cached, error: None },
                Err(e) => {
                    tracing::debug!(zip, error = %e, "rent batch item failed");
                    RentBatchItem { zip, data: None, cached: false, error: Some(e.to_body()) }
                }
            };
            slots[idx] = Some(item);
        }

        let items: Vec<RentBatchItem> = slots.into_iter().flatten().collect();
        let failed = items.iter().filter(|item| item.error.is_some()).count();
        Ok(RentBatch { succeeded: items.len() - failed, failed, items })
    }

    async fn load_zip(&self, zip: &str) -> Result<FairMarketRent, Error> {
        let metro = self
            .resolver
            .resolve_metro(zip)
            .await?
            .ok_or_else(|| Error::NotFound(format!("ZIP {zip} does not map to a metro area")))?;

        let token = self.config.require_hud_api_key()?;
        let url = self.endpoint(&format!("fmr/data/METRO{0}M{0}", metro.metro_code))?;
        let raw: FmrDataResponse =
            fetch_json(self.transport.as_ref(), Source::FairMarketRent, ApiRequest::get(url).bearer(token)).await?;

        let basic = raw
            .data
            .basicdata
            .as_ref()
            .ok_or_else(|| Error::upstream(Source::FairMarketRent.as_str(), "response has no basicdata"))?;
        let (row, is_small_area_fmr) = response::select_row(basic, zip).ok_or_else(|| {
            Error::NotFound(format!("no fair market rent row for ZIP {zip} in metro {}", metro.metro_code))
        })?;

        Ok(FairMarketRent {
            zip_code: zip.to_string(),
            rents_by_bedroom: row.rents(),
            is_small_area_fmr,
            is_split_zip: metro.is_split_zip,
            year: raw.data.year,
            metro_name: raw.data.metro_name.clone().or(raw.data.area_name.clone()).unwrap_or(metro.metro_name),
            metro_code: metro.metro_code,
        })
    }

    async fn load_state(&self, code: &str) -> Result<StateRents, Error> {
        let token = self.config.require_hud_api_key()?;
        let url = self.endpoint(&format!("fmr/statedata/{code}"))?;
        let raw: StateDataResponse =
            fetch_json(self.transport.as_ref(), Source::FairMarketRent, ApiRequest::get(url).bearer(token)).await?;

        if raw.data.metroareas.is_empty() {
            return Err(Error::NotFound(format!("no metro area rents for state {code}")));
        }
        Ok(StateRents::from_raw(code, raw.data))
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let base = self.config.hud_base_url.trim_end_matches('/');
        Url::parse(&format!("{base}/{path}")).map_err(|e| Error::Internal(format!("invalid HUD base URL: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{StubReply, StubTransport};
    use costmap_core::{CrosswalkRecord, ErrorCode};
    use serde_json::json;

    fn rec(zip: &str, code: &str, name: &str, ratio: f64) -> CrosswalkRecord {
        CrosswalkRecord { zip_code: zip.into(), metro_code: code.into(), metro_name: name.into(), residential_ratio: ratio }
    }

    async fn client(stub: StubTransport, key: Option<&str>) -> RentClient {
        let store = Store::open_in_memory().await.unwrap();
        store
            .load_crosswalk(&[
                rec("90210", "31080", "Los Angeles-Long Beach-Anaheim, CA", 1.0),
                rec("39201", "27140", "Jackson, MS", 0.8),
                rec("39201", "25060", "Gulfport-Biloxi, MS", 0.2),
            ])
            .await
            .unwrap();
        let config = AppConfig {
            hud_api_key: key.map(String::from),
            hud_base_url: "https://hud.test/hudapi/public/".into(),
            ..Default::default()
        };
        RentClient::new(Arc::new(stub), store, Arc::new(config))
    }

    fn la_reply() -> StubReply {
        StubReply::json(json!({"data": {
            "metro_name": "Los Angeles-Long Beach-Glendale, CA HUD Metro FMR Area",
            "year": 2024,
            "basicdata": [
                {"zip_code": "MSA level", "Efficiency": 1744, "One-Bedroom": 1966, "Two-Bedroom": 2493, "Three-Bedroom": 3265, "Four-Bedroom": 3607},
                {"zip_code": "90210", "Efficiency": 3010, "One-Bedroom": 3390, "Two-Bedroom": 4300, "Three-Bedroom": 5630, "Four-Bedroom": 6210}
            ]
        }}))
    }

    fn jackson_reply() -> StubReply {
        StubReply::json(json!({"data": {
            "area_name": "Jackson, MS HUD Metro FMR Area",
            "year": "2024",
            "basicdata": {"Efficiency": 812, "One-Bedroom": 880, "Two-Bedroom": 1051, "Three-Bedroom": 1377}
        }}))
    }

    #[tokio::test]
    async fn test_zip_resolves_metro_and_caches() {
        let stub = StubTransport::new().route("METRO31080M31080", la_reply());
        let client = client(stub.clone(), Some("hud-token")).await;

        let first = client.zip("90210").await.unwrap();
        assert!(!first.cached);
        assert!(first.data.is_small_area_fmr);
        assert_eq!(first.data.rents_by_bedroom, [3010.0, 3390.0, 4300.0, 5630.0, 6210.0]);
        assert_eq!(first.data.metro_code, "31080");

        let calls = stub.calls();
        assert_eq!(calls[0].url.as_str(), "https://hud.test/hudapi/public/fmr/data/METRO31080M31080");
        assert_eq!(calls[0].headers[0].1, "Bearer hud-token");

        assert!(client.zip("90210").await.unwrap().cached);
        assert_eq!(stub.call_count(), 1);
    }

    #[tokio::test]
    async fn test_split_zip_non_small_area() {
        let stub = StubTransport::new().route("METRO27140M27140", jackson_reply());
        let rent = client(stub, Some("t")).await.zip("39201").await.unwrap().data;

        assert!(rent.is_split_zip);
        assert!(!rent.is_small_area_fmr);
        assert_eq!(rent.rents_by_bedroom[4], 0.0);
        assert_eq!(rent.metro_name, "Jackson, MS HUD Metro FMR Area");
    }

    #[tokio::test]
    async fn test_unmapped_zip_is_not_found_without_network() {
        let stub = StubTransport::new();
        let err = client(stub.clone(), Some("t")).await.zip("00501").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_reports_per_item_errors() {
        let stub = StubTransport::new()
            .route("METRO31080M31080", la_reply())
            .route("METRO27140M27140", jackson_reply());
        let client = client(stub, Some("t")).await;

        let zips = vec!["90210".to_string(), "9021".to_string(), "39201".to_string()];
        let batch = client.batch(&zips).await.unwrap();

        assert_eq!(batch.succeeded, 2);
        assert_eq!(batch.failed, 1);
        let order: Vec<_> = batch.items.iter().map(|i| i.zip.as_str()).collect();
        assert_eq!(order, vec!["90210", "9021", "39201"]);
        assert_eq!(batch.items[1].error.as_ref().unwrap().code, ErrorCode::InvalidParams);
    }

    #[tokio::test]
    async fn test_batch_bounds() {
        let client = client(StubTransport::new(), Some("t")).await;
        assert!(client.batch(&[]).await.is_err());

        let too_many: Vec<String> = (0..21).map(|n| format!("{:05}", 90000 + n)).collect();
        assert_eq!(client.batch(&too_many).await.unwrap_err().code(), ErrorCode::InvalidParams);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_error_not_zeroes() {
        let stub = StubTransport::new().route("METRO31080M31080", StubReply::Status(500));
        let err = client(stub, Some("t")).await.zip("90210").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UpstreamError);
    }

    #[tokio::test]
    async fn test_state_rents() {
        let stub = StubTransport::new().route(
            "fmr/statedata/MS",
            StubReply::json(json!({"data": {"year": "2024", "metroareas": [
                {"metro_name": "Jackson, MS HUD Metro FMR Area", "code": "METRO27140M27140", "Efficiency": 812, "One-Bedroom": 880, "Two-Bedroom": 1051, "Three-Bedroom": 1377, "Four-Bedroom": 1617}
            ]}})),
        );
        let rents = client(stub, Some("t")).await.state("ms").await.unwrap().data;
        assert_eq!(rents.state_code, "MS");
        assert_eq!(rents.metros[0].metro_code, "27140");
        assert_eq!(rents.year, Some(2024));
    }

    #[tokio::test]
    async fn test_missing_token_is_internal() {
        let err = client(StubTransport::new(), None).await.zip("90210").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InternalError);
    }
}

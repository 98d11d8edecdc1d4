//! Consumer price index client (BLS CPI-U, public API v2).
//!
//! ### API
//!
//! - **Endpoint**: `POST {base}` with `seriesid`, `startyear`, `endyear`
//! - **Authentication**: optional `registrationkey`; keyless access works with lower quotas.
//! - **Series**: national plus the four census regions, fetched in one request.
//! - **Index**: latest regional value / latest national value x 100, or 100
//!   when either is unavailable.

pub mod response;

pub use response::{CpiPoint, CpiSeries};

use std::sync::Arc;

use chrono::Datelike;
use costmap_core::geo::{self, CensusRegion, NATIONAL_CPI_SERIES};
use costmap_core::{AppConfig, Error, Source, Store};
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::fetched::{Fetched, read_through};
use crate::transport::{ApiRequest, Transport, fetch_json};
use response::{BlsApiResponse, REQUEST_SUCCEEDED};

/// Every series for the requested span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpiSnapshot {
    pub start_year: i32,
    pub end_year: i32,
    pub series: Vec<CpiSeries>,
}

impl CpiSnapshot {
    pub fn series(&self, series_id: &str) -> Option<&CpiSeries> {
        self.series.iter().find(|s| s.series_id == series_id)
    }

    fn latest(&self, series_id: &str) -> Option<CpiPoint> {
        self.series(series_id).and_then(CpiSeries::latest)
    }

    /// Regional index against the national latest value.
    pub fn index_for(&self, region: Option<CensusRegion>) -> PriceIndex {
        let national = self.latest(NATIONAL_CPI_SERIES);
        let series_id = region.map_or(NATIONAL_CPI_SERIES, CensusRegion::cpi_series_id);
        let latest = self.latest(series_id);
        PriceIndex {
            region,
            series_id: series_id.to_string(),
            index: compute_index(latest.map(|p| p.value), national.map(|p| p.value)),
            latest,
            national,
        }
    }
}

/// Regional value relative to national, x100. Defaults to 100.
pub fn compute_index(regional: Option<f64>, national: Option<f64>) -> f64 {
    match (regional, national) {
        (Some(r), Some(n)) if n != 0.0 => r / n * 100.0,
        _ => 100.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceIndex {
    /// None for the national bucket.
    pub region: Option<CensusRegion>,
    pub series_id: String,
    pub index: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<CpiPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national: Option<CpiPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePriceIndex {
    pub state_code: String,
    #[serde(flatten)]
    pub index: PriceIndex,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceIndexSeries {
    pub region: Option<CensusRegion>,
    pub series_id: String,
    pub points: Vec<CpiPoint>,
}

/// Where a timeseries query points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesTarget {
    Region(CensusRegion),
    State(String),
    National,
}

/// BLS CPI client.
#[derive(Debug, Clone)]
pub struct PriceIndexClient {
    transport: Arc<dyn Transport>,
    store: Store,
    config: Arc<AppConfig>,
}

impl PriceIndexClient {
    pub fn new(transport: Arc<dyn Transport>, store: Store, config: Arc<AppConfig>) -> Self {
        Self { transport, store, config }
    }

    pub async fn national(&self) -> Result<Fetched<PriceIndex>, Error> {
        Ok(self.snapshot().await?.map(|s| s.index_for(None)))
    }

    pub async fn region(&self, region: CensusRegion) -> Result<Fetched<PriceIndex>, Error> {
        Ok(self.snapshot().await?.map(|s| s.index_for(Some(region))))
    }

    /// A state's census-region index. Codes outside the membership lists use the national bucket.
    pub async fn state(&self, state: &str) -> Result<Fetched<StatePriceIndex>, Error> {
        let state_code = state.trim().to_ascii_uppercase();
        if state_code.len() != 2 || !state_code.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(Error::InvalidParams(format!("invalid state code '{state}'")));
        }
        let region = geo::by_code(&state_code).map(|info| info.region);
        Ok(self
            .snapshot()
            .await?
            .map(|s| StatePriceIndex { state_code, index: s.index_for(region) }))
    }

    pub async fn regions(&self) -> Result<Fetched<Vec<PriceIndex>>, Error> {
        Ok(self
            .snapshot()
            .await?
            .map(|s| CensusRegion::ALL.into_iter().map(|r| s.index_for(Some(r))).collect()))
    }

    /// Monthly points ascending by `(year, month)`.
    pub async fn timeseries(&self, target: SeriesTarget) -> Result<Fetched<PriceIndexSeries>, Error> {
        let region = match target {
            SeriesTarget::Region(region) => Some(region),
            SeriesTarget::State(code) => {
                if code.len() != 2 {
                    return Err(Error::InvalidParams(format!("invalid state code '{code}'")));
                }
                geo::by_code(&code).map(|info| info.region)
            }
            SeriesTarget::National => None,
        };
        let series_id = region.map_or(NATIONAL_CPI_SERIES, CensusRegion::cpi_series_id);

        self.snapshot().await?.try_map(|s| {
            let series = s
                .series(series_id)
                .ok_or_else(|| Error::NotFound(format!("no CPI data for series {series_id}")))?;
            Ok(PriceIndexSeries { region, series_id: series_id.to_string(), points: series.points.clone() })
        })
    }

    async fn snapshot(&self) -> Result<Fetched<CpiSnapshot>, Error> {
        let end_year = self.store.now().year();
        let start_year = end_year - self.config.price_index_years.saturating_sub(1) as i32;
        let key = format!("cpi:{start_year}-{end_year}");
        read_through(&self.store, Source::PriceIndex, &key, || self.load(start_year, end_year)).await
    }

    async fn load(&self, start_year: i32, end_year: i32) -> Result<CpiSnapshot, Error> {
        let mut series_ids = vec![NATIONAL_CPI_SERIES];
        series_ids.extend(CensusRegion::ALL.iter().map(|r| r.cpi_series_id()));

        let mut body = json!({
            "seriesid": series_ids,
            "startyear": start_year.to_string(),
            "endyear": end_year.to_string(),
        });
        if let Some(key) = self.config.bls_api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            body["registrationkey"] = json!(key);
        }

        let url =
            Url::parse(&self.config.bls_base_url).map_err(|e| Error::Internal(format!("invalid BLS base URL: {e}")))?;
        let raw: BlsApiResponse =
            fetch_json(self.transport.as_ref(), Source::PriceIndex, ApiRequest::post_json(url, body)).await?;

        if raw.status != REQUEST_SUCCEEDED {
            let detail = if raw.message.is_empty() { raw.status.clone() } else { raw.message.join("; ") };
            return Err(Error::upstream(Source::PriceIndex.as_str(), detail));
        }

        let series: Vec<CpiSeries> = raw
            .results
            .map(|r| r.series.into_iter().map(CpiSeries::from).collect())
            .unwrap_or_default();
        if series.iter().all(|s| s.points.is_empty()) {
            return Err(Error::upstream(Source::PriceIndex.as_str(), "response carried no usable monthly points"));
        }

        Ok(CpiSnapshot { start_year, end_year, series })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{StubReply, StubTransport};
    use chrono::TimeZone;
    use costmap_core::{ErrorCode, ManualClock};

    fn series(id: &str, points: &[(&str, &str, &str)]) -> serde_json::Value {
        let data: Vec<_> = points
            .iter()
            .map(|(year, period, value)| json!({"year": year, "period": period, "value": value}))
            .collect();
        json!({"seriesID": id, "data": data})
    }

    fn ok_reply() -> StubReply {
        StubReply::json(json!({
            "status": "REQUEST_SUCCEEDED",
            "message": [],
            "Results": {"series": [
                series("CUUR0000SA0", &[("2024", "M10", "300.0"), ("2024", "M9", "290.0")]),
                series("CUUR0100SA0", &[("2024", "M10", "330.0"), ("2024", "M09", "320.0")]),
                series("CUUR0200SA0", &[("2024", "M10", "285.0")]),
                series("CUUR0300SA0", &[("2024", "M10", "294.0")]),
                series("CUUR0400SA0", &[])
            ]}
        }))
    }

    async fn client(stub: StubTransport, key: Option<&str>) -> PriceIndexClient {
        let clock = ManualClock::new(chrono::Utc.with_ymd_and_hms(2024, 11, 20, 0, 0, 0).unwrap());
        let store = Store::open_in_memory().await.unwrap().with_clock(Arc::new(clock));
        let config = AppConfig {
            bls_api_key: key.map(String::from),
            bls_base_url: "https://bls.test/publicAPI/v2/timeseries/data/".into(),
            ..Default::default()
        };
        PriceIndexClient::new(Arc::new(stub), store, Arc::new(config))
    }

    #[tokio::test]
    async fn test_region_index_against_national() {
        let stub = StubTransport::new().route("CUUR0000SA0", ok_reply());
        let client = client(stub.clone(), None).await;

        let northeast = client.region(CensusRegion::Northeast).await.unwrap();
        assert!((northeast.data.index - 110.0).abs() < 1e-9);
        assert_eq!(northeast.data.latest.unwrap().month, 10);

        let body = stub.calls()[0].body.clone().unwrap();
        assert_eq!(body["startyear"], "2022");
        assert_eq!(body["endyear"], "2024");
        assert!(body.get("registrationkey").is_none());

        assert!(client.national().await.unwrap().cached);
        assert_eq!(stub.call_count(), 1);
    }

    #[tokio::test]
    async fn test_state_maps_to_region_or_national() {
        let client = client(StubTransport::new().route("seriesid", ok_reply()), Some("bls-key")).await;

        let tx = client.state("tx").await.unwrap().data;
        assert_eq!(tx.index.region, Some(CensusRegion::South));
        assert!((tx.index.index - 98.0).abs() < 1e-9);

        let pr = client.state("PR").await.unwrap().data;
        assert_eq!(pr.index.region, None);
        assert_eq!(pr.index.index, 100.0);

        assert_eq!(client.state("Texas").await.unwrap_err().code(), ErrorCode::InvalidParams);
    }

    #[tokio::test]
    async fn test_missing_series_defaults_to_100() {
        let client = client(StubTransport::new().route("seriesid", ok_reply()), None).await;
        let regions = client.regions().await.unwrap().data;
        assert_eq!(regions.len(), 4);
        let west = regions.iter().find(|r| r.region == Some(CensusRegion::West)).unwrap();
        assert_eq!(west.index, 100.0);
    }

    #[tokio::test]
    async fn test_timeseries_ascending() {
        let client = client(StubTransport::new().route("seriesid", ok_reply()), None).await;
        let ts = client.timeseries(SeriesTarget::State("ME".into())).await.unwrap().data;
        assert_eq!(ts.series_id, "CUUR0100SA0");
        let months: Vec<_> = ts.points.iter().map(|p| p.month).collect();
        assert_eq!(months, vec![9, 10]);
    }

    #[tokio::test]
    async fn test_registration_key_sent_when_configured() {
        let stub = StubTransport::new().route("seriesid", ok_reply());
        client(stub.clone(), Some("bls-key")).await.national().await.unwrap();
        assert_eq!(stub.calls()[0].body.as_ref().unwrap()["registrationkey"], "bls-key");
    }

    #[tokio::test]
    async fn test_failed_status_is_upstream() {
        let stub = StubTransport::new().route(
            "seriesid",
            StubReply::json(json!({"status": "REQUEST_NOT_PROCESSED", "message": ["daily threshold reached"]})),
        );
        let err = client(stub, None).await.national().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UpstreamError);
        assert!(err.to_string().contains("threshold"));
    }
}

//! price_index tool: BLS consumer price index by census region.

use costmap_client::SeriesTarget;
use costmap_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::aggregator::Aggregator;
use crate::query::{PriceIndexQuery, parse_region, required, unknown_type};

const TYPES: [&str; 5] = ["national", "state", "region", "timeseries", "regions"];

/// Input parameters for the price_index tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PriceIndexParams {
    /// Query type: "national", "state", "region", "timeseries", or "regions".
    #[serde(rename = "type")]
    pub kind: String,

    /// Two-letter state code (for "state", or "timeseries" of a state's region).
    #[serde(default)]
    pub state: Option<String>,

    /// Census region: northeast, midwest, south, or west.
    #[serde(default)]
    pub region: Option<String>,

    /// Rate-limit identifier for the caller.
    #[serde(default = "super::default_client_id")]
    pub client_id: String,
}

impl PriceIndexParams {
    /// `timeseries` prefers `region`, then `state`, then the national series.
    pub fn parse(&self) -> Result<PriceIndexQuery, Error> {
        match self.kind.trim() {
            "national" => Ok(PriceIndexQuery::National),
            "regions" => Ok(PriceIndexQuery::Regions),
            "state" => Ok(PriceIndexQuery::State(required(self.state.as_deref(), "state", "state")?)),
            "region" => {
                let region = required(self.region.as_deref(), "region", "region")?;
                Ok(PriceIndexQuery::Region(parse_region(&region)?))
            }
            "timeseries" => {
                let target = if let Some(region) = self.region.as_deref().filter(|r| !r.trim().is_empty()) {
                    SeriesTarget::Region(parse_region(region)?)
                } else if let Some(state) = self.state.as_deref().filter(|s| !s.trim().is_empty()) {
                    SeriesTarget::State(state.trim().to_ascii_uppercase())
                } else {
                    SeriesTarget::National
                };
                Ok(PriceIndexQuery::Timeseries(target))
            }
            other => Err(unknown_type(other, &TYPES)),
        }
    }
}

pub async fn price_index_impl(aggregator: &Aggregator, params: PriceIndexParams) -> Result<CallToolResult, McpError> {
    let envelope = aggregator.price_index(&params.client_id, params.parse()).await;
    Ok(envelope.into_call_result())
}

#[cfg(test)]
mod tests {
    use super::*;
    use costmap_core::geo::CensusRegion;

    fn parse(value: serde_json::Value) -> Result<PriceIndexQuery, Error> {
        serde_json::from_value::<PriceIndexParams>(value).unwrap().parse()
    }

    #[test]
    fn test_timeseries_target_selection() {
        assert_eq!(
            parse(serde_json::json!({"type": "timeseries", "region": "West", "state": "NY"})).unwrap(),
            PriceIndexQuery::Timeseries(SeriesTarget::Region(CensusRegion::West))
        );
        assert_eq!(
            parse(serde_json::json!({"type": "timeseries", "state": "ny"})).unwrap(),
            PriceIndexQuery::Timeseries(SeriesTarget::State("NY".into()))
        );
        assert_eq!(
            parse(serde_json::json!({"type": "timeseries"})).unwrap(),
            PriceIndexQuery::Timeseries(SeriesTarget::National)
        );
    }

    #[test]
    fn test_region_validation() {
        assert!(parse(serde_json::json!({"type": "region", "region": "pacific"})).is_err());
        assert!(parse(serde_json::json!({"type": "region"})).is_err());
        assert_eq!(parse(serde_json::json!({"type": "regions"})).unwrap(), PriceIndexQuery::Regions);
    }
}

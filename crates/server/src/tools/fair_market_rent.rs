//! fair_market_rent tool: HUD fair market rents by ZIP, state, or batch.

use costmap_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::aggregator::Aggregator;
use crate::query::{RentQuery, required, unknown_type};

const TYPES: [&str; 3] = ["zip", "state", "batch"];

/// Input parameters for the fair_market_rent tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FairMarketRentParams {
    /// Query type: "zip", "state", or "batch".
    #[serde(rename = "type")]
    pub kind: String,

    /// 5-digit ZIP code (for type "zip").
    #[serde(default)]
    pub zip: Option<String>,

    /// Two-letter state code (for type "state").
    #[serde(default)]
    pub state: Option<String>,

    /// Up to 20 ZIP codes (for type "batch"). Each is validated on its own.
    #[serde(default)]
    pub zips: Option<Vec<String>>,

    /// Rate-limit identifier for the caller.
    #[serde(default = "super::default_client_id")]
    pub client_id: String,
}

impl FairMarketRentParams {
    pub fn parse(&self) -> Result<RentQuery, Error> {
        match self.kind.trim() {
            "zip" => Ok(RentQuery::Zip(required(self.zip.as_deref(), "zip", "zip")?)),
            "state" => Ok(RentQuery::State(required(self.state.as_deref(), "state", "state")?)),
            "batch" => match &self.zips {
                Some(zips) if !zips.is_empty() => Ok(RentQuery::Batch(zips.clone())),
                _ => Err(Error::InvalidParams("'zips' is required for type 'batch'".into())),
            },
            other => Err(unknown_type(other, &TYPES)),
        }
    }
}

pub async fn fair_market_rent_impl(
    aggregator: &Aggregator, params: FairMarketRentParams,
) -> Result<CallToolResult, McpError> {
    let envelope = aggregator.fair_market_rent(&params.client_id, params.parse()).await;
    Ok(envelope.into_call_result())
}

//! price_parity tool: BEA regional price parities.

use costmap_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::aggregator::Aggregator;
use crate::query::{PriceParityQuery, required, unknown_type};

const TYPES: [&str; 4] = ["states", "metros", "state", "metro"];

/// Input parameters for the price_parity tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PriceParityParams {
    /// Query type: "states", "metros", "state", or "metro".
    #[serde(rename = "type")]
    pub kind: String,

    /// State postal code or FIPS (for type "state").
    #[serde(default)]
    pub state: Option<String>,

    /// 5-digit CBSA code (for type "metro").
    #[serde(default)]
    pub metro: Option<String>,

    /// Data year. Defaults to the configured year, else two years ago.
    #[serde(default)]
    pub year: Option<i32>,

    /// Rate-limit identifier for the caller.
    #[serde(default = "super::default_client_id")]
    pub client_id: String,
}

impl PriceParityParams {
    pub fn parse(&self) -> Result<PriceParityQuery, Error> {
        let year = self.year;
        match self.kind.trim() {
            "states" => Ok(PriceParityQuery::States { year }),
            "metros" => Ok(PriceParityQuery::Metros { year }),
            "state" => Ok(PriceParityQuery::State { state: required(self.state.as_deref(), "state", "state")?, year }),
            "metro" => Ok(PriceParityQuery::Metro { cbsa: required(self.metro.as_deref(), "metro", "metro")?, year }),
            other => Err(unknown_type(other, &TYPES)),
        }
    }
}

pub async fn price_parity_impl(aggregator: &Aggregator, params: PriceParityParams) -> Result<CallToolResult, McpError> {
    let envelope = aggregator.price_parity(&params.client_id, params.parse()).await;
    Ok(envelope.into_call_result())
}

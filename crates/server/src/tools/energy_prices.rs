//! energy_prices tool: EIA electricity, natural gas, and gasoline prices.

use costmap_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::aggregator::Aggregator;
use crate::query::{EnergyQuery, required, unknown_type};

const TYPES: [&str; 4] = ["all", "state", "utility", "utility-state"];

/// Input parameters for the energy_prices tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EnergyPricesParams {
    /// Query type: "all", "state", "utility", or "utility-state".
    #[serde(rename = "type")]
    pub kind: String,

    /// Two-letter state code (for "state" and "utility-state").
    #[serde(default)]
    pub state: Option<String>,

    /// Rate-limit identifier for the caller.
    #[serde(default = "super::default_client_id")]
    pub client_id: String,
}

impl EnergyPricesParams {
    pub fn parse(&self) -> Result<EnergyQuery, Error> {
        match self.kind.trim() {
            "all" => Ok(EnergyQuery::All),
            "utility" => Ok(EnergyQuery::Utility),
            "state" => Ok(EnergyQuery::State(required(self.state.as_deref(), "state", "state")?)),
            "utility-state" => Ok(EnergyQuery::UtilityState(required(self.state.as_deref(), "state", "utility-state")?)),
            other => Err(unknown_type(other, &TYPES)),
        }
    }
}

pub async fn energy_prices_impl(aggregator: &Aggregator, params: EnergyPricesParams) -> Result<CallToolResult, McpError> {
    let envelope = aggregator.energy(&params.client_id, params.parse()).await;
    Ok(envelope.into_call_result())
}

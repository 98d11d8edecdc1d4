//! cache_admin tool: inspect and prune the shared cache.

use costmap_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::aggregator::Aggregator;
use crate::query::{CacheAdminQuery, parse_source, unknown_type};

const TYPES: [&str; 3] = ["invalidate", "sweep", "count"];

/// Input parameters for the cache_admin tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheAdminParams {
    /// Operation: "invalidate", "sweep", or "count".
    #[serde(rename = "type")]
    pub kind: String,

    /// Feed to restrict to: price-parity, fair-market-rent, price-index, or energy.
    #[serde(default)]
    pub source: Option<String>,

    /// Exact location key to invalidate, e.g. "zip:90210".
    #[serde(default)]
    pub key: Option<String>,

    /// Rate-limit identifier for the caller.
    #[serde(default = "super::default_client_id")]
    pub client_id: String,
}

impl CacheAdminParams {
    /// `invalidate` with neither `source` nor `key` clears every entry.
    pub fn parse(&self) -> Result<CacheAdminQuery, Error> {
        let source = parse_source(self.source.as_deref())?;
        match self.kind.trim() {
            "invalidate" => {
                let key = self.key.as_deref().map(str::trim).filter(|k| !k.is_empty()).map(String::from);
                Ok(CacheAdminQuery::Invalidate { source, key })
            }
            "sweep" => Ok(CacheAdminQuery::Sweep),
            "count" => Ok(CacheAdminQuery::Count { source }),
            other => Err(unknown_type(other, &TYPES)),
        }
    }
}

pub async fn cache_admin_impl(aggregator: &Aggregator, params: CacheAdminParams) -> Result<CallToolResult, McpError> {
    let envelope = aggregator.cache_admin(&params.client_id, params.parse()).await;
    Ok(envelope.into_call_result())
}

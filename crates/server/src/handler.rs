//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the aggregator.

use crate::aggregator::Aggregator;
use crate::tools::{
    CacheAdminParams, EnergyPricesParams, FairMarketRentParams, PriceIndexParams, PriceParityParams,
    cache_admin::cache_admin_impl, energy_prices::energy_prices_impl, fair_market_rent::fair_market_rent_impl,
    price_index::price_index_impl, price_parity::price_parity_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for costmap.
#[derive(Clone)]
pub struct CostmapServer {
    aggregator: Aggregator,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl CostmapServer {
    pub fn new(aggregator: Aggregator) -> Self {
        Self { aggregator, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Regional price parities (100 = national average) from BEA. Types: states, metros, state, metro. Reports the data year actually used."
    )]
    async fn price_parity(&self, params: Parameters<PriceParityParams>) -> Result<CallToolResult, McpError> {
        price_parity_impl(&self.aggregator, params.0).await
    }

    #[tool(
        description = "Consumer price index by census region relative to the national series (100 = national). Types: national, state, region, timeseries, regions."
    )]
    async fn price_index(&self, params: Parameters<PriceIndexParams>) -> Result<CallToolResult, McpError> {
        price_index_impl(&self.aggregator, params.0).await
    }

    #[tool(
        description = "Residential electricity, natural gas, and regular gasoline prices with indices against national averages. Types: all, state, utility, utility-state."
    )]
    async fn energy_prices(&self, params: Parameters<EnergyPricesParams>) -> Result<CallToolResult, McpError> {
        energy_prices_impl(&self.aggregator, params.0).await
    }

    #[tool(
        description = "HUD fair market rents by bedroom count. Types: zip (resolved to its primary metro), state, batch (up to 20 ZIPs, per-item errors)."
    )]
    async fn fair_market_rent(&self, params: Parameters<FairMarketRentParams>) -> Result<CallToolResult, McpError> {
        fair_market_rent_impl(&self.aggregator, params.0).await
    }

    #[tool(description = "Inspect or prune the response cache. Types: invalidate (by source and/or key), sweep, count.")]
    async fn cache_admin(&self, params: Parameters<CacheAdminParams>) -> Result<CallToolResult, McpError> {
        cache_admin_impl(&self.aggregator, params.0).await
    }
}

impl ServerHandler for CostmapServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "costmap".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Cost-of-living data aggregated from BEA, HUD, BLS, and EIA. Every tool returns a \
                 {success, data | error, meta} envelope."
                    .into(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

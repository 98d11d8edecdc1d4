//! The response envelope every tool returns.

use chrono::{DateTime, Utc};
use costmap_client::Fetched;
use costmap_core::{Error, ErrorBody, RateLimitDecision, Source};
use rmcp::model::{CallToolResult, Content};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Uniform `{success, data | error, meta}` wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub meta: Meta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_age: Option<i64>,
    /// Year the data actually describes, when it can differ from the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_year: Option<i32>,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitMeta {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl From<&RateLimitDecision> for RateLimitMeta {
    fn from(decision: &RateLimitDecision) -> Self {
        Self { limit: decision.limit, remaining: decision.remaining, reset_at: decision.reset_time }
    }
}

/// A successful handler result before it is wrapped.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub data: Value,
    pub cached: bool,
    pub cache_age: Option<i64>,
    pub data_year: Option<i32>,
}

impl Reply {
    /// # Errors
    ///
    /// Returns `Error::Internal` if the payload cannot be serialized.
    pub fn from_fetched<T: Serialize>(fetched: Fetched<T>) -> Result<Self, Error> {
        Ok(Self {
            data: to_value(&fetched.data)?,
            cached: fetched.cached,
            cache_age: fetched.cache_age,
            data_year: None,
        })
    }

    /// Uncached data, such as admin results and batches.
    pub fn fresh<T: Serialize>(data: &T) -> Result<Self, Error> {
        Ok(Self { data: to_value(data)?, cached: false, cache_age: None, data_year: None })
    }

    pub fn with_data_year(mut self, year: i32) -> Self {
        self.data_year = Some(year);
        self
    }
}

fn to_value<T: Serialize>(data: &T) -> Result<Value, Error> {
    serde_json::to_value(data).map_err(|e| Error::Internal(format!("failed to serialize response: {e}")))
}

impl Envelope {
    pub fn success(source: Option<Source>, reply: Reply, generated_at: DateTime<Utc>) -> Self {
        Self {
            success: true,
            data: Some(reply.data),
            error: None,
            meta: Meta {
                source,
                cached: reply.cached,
                cache_age: reply.cache_age,
                data_year: reply.data_year,
                generated_at,
                rate_limit: None,
            },
        }
    }

    pub fn failure(source: Option<Source>, error: &Error, generated_at: DateTime<Utc>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_body()),
            meta: Meta {
                source,
                cached: false,
                cache_age: None,
                data_year: None,
                generated_at,
                rate_limit: None,
            },
        }
    }

    pub fn with_rate_limit(mut self, decision: &RateLimitDecision) -> Self {
        self.meta.rate_limit = Some(decision.into());
        self
    }

    /// Render as an MCP tool result. Failures set `is_error` but still carry the envelope.
    pub fn into_call_result(self) -> CallToolResult {
        let json = serde_json::to_string_pretty(&self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize envelope");
            r#"{"success":false,"error":{"code":"INTERNAL_ERROR","message":"internal error","status":500},"meta":{"cached":false}}"#
                .to_string()
        });
        if self.success {
            CallToolResult::success(vec![Content::text(json)])
        } else {
            CallToolResult::error(vec![Content::text(json)])
        }
    }
}

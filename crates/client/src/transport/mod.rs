//! HTTP transport seam shared by the feed clients.
//!
//! Feed clients build an [`ApiRequest`] and hand it to a [`Transport`]. The
//! production implementation is [`HttpTransport`] over reqwest; tests plug in
//! [`StubTransport`] with canned replies routed by URL fragment.

pub mod http;
pub mod stub;

use std::fmt::Debug;

use bytes::Bytes;
use costmap_core::{Error, Source};
use serde::de::DeserializeOwned;
use url::Url;

pub use http::HttpTransport;
pub use stub::{StubReply, StubTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One outbound upstream call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(url: Url) -> Self {
        Self { method: Method::Get, url, headers: Vec::new(), body: None }
    }

    pub fn post_json(url: Url, body: serde_json::Value) -> Self {
        Self { method: Method::Post, url, headers: Vec::new(), body: Some(body) }
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.headers.push(("Authorization".into(), format!("Bearer {token}")));
        self
    }
}

/// Failures below the vendor payload level.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timeout")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response.
    #[error("HTTP error: {status}")]
    Status { status: u16 },

    #[error("unreadable response body: {0}")]
    Body(String),
}

impl TransportError {
    pub fn into_upstream(self, source: Source) -> Error {
        Error::upstream(source.as_str(), self.to_string())
    }
}

/// Sends requests and returns the raw 2xx body.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn send(&self, request: ApiRequest) -> Result<Bytes, TransportError>;
}

/// Send `request` and decode the body as `R`.
///
/// Transport failures and undecodable bodies both surface as upstream errors.
pub async fn fetch_json<R: DeserializeOwned>(
    transport: &dyn Transport, source: Source, request: ApiRequest,
) -> Result<R, Error> {
    let path = request.url.path().to_string();
    tracing::debug!(source = %source, path, "calling upstream");

    let bytes = transport.send(request).await.map_err(|e| {
        tracing::warn!(source = %source, path, error = %e, "upstream call failed");
        e.into_upstream(source)
    })?;

    serde_json::from_slice(&bytes)
        .map_err(|e| Error::upstream(source.as_str(), format!("malformed payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use costmap_core::ErrorCode;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Pong {
        ok: bool,
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_json_decodes_body() {
        let stub = StubTransport::new().route("/ping", StubReply::json(serde_json::json!({"ok": true})));
        let pong: Pong = fetch_json(&stub, Source::Energy, ApiRequest::get(url("https://api.test/ping")))
            .await
            .unwrap();
        assert!(pong.ok);
    }

    #[tokio::test]
    async fn test_non_2xx_is_upstream_error() {
        let stub = StubTransport::new().route("/ping", StubReply::Status(503));
        let err = fetch_json::<Pong>(&stub, Source::PriceIndex, ApiRequest::get(url("https://api.test/ping")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UpstreamError);
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_timeout_and_malformed_are_upstream_errors() {
        let stub = StubTransport::new()
            .route("/slow", StubReply::Timeout)
            .route("/garbage", StubReply::Raw("<html>oops</html>".into()));

        let slow = fetch_json::<Pong>(&stub, Source::Energy, ApiRequest::get(url("https://api.test/slow"))).await;
        assert_eq!(slow.unwrap_err().code(), ErrorCode::UpstreamError);

        let garbage = fetch_json::<Pong>(&stub, Source::Energy, ApiRequest::get(url("https://api.test/garbage"))).await;
        let err = garbage.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UpstreamError);
        assert!(err.to_string().contains("malformed payload"));
    }

    #[test]
    fn test_bearer_header() {
        let req = ApiRequest::get(url("https://api.test/x")).bearer("tok");
        assert_eq!(req.headers, vec![("Authorization".to_string(), "Bearer tok".to_string())]);
    }
}

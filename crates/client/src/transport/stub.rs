//! Canned-response transport for offline tests.

use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;

use super::{ApiRequest, Transport, TransportError};

/// What the stub answers for a matched route.
#[derive(Debug, Clone)]
pub enum StubReply {
    Json(serde_json::Value),
    Raw(String),
    Status(u16),
    Timeout,
}

impl StubReply {
    pub fn json(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// Routes requests to replies by substring match on `"{url} {body}"`.
///
/// The first matching route wins. Unmatched requests get a 404. Every request
/// is recorded so tests can assert on what reached the network.
#[derive(Debug, Clone, Default)]
pub struct StubTransport {
    routes: Vec<(String, StubReply)>,
    calls: Arc<Mutex<Vec<ApiRequest>>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, fragment: impl Into<String>, reply: StubReply) -> Self {
        self.routes.push((fragment.into(), reply));
        self
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of recorded calls whose URL or body contains `fragment`.
    pub fn calls_matching(&self, fragment: &str) -> usize {
        self.calls()
            .iter()
            .filter(|request| haystack(request).contains(fragment))
            .count()
    }
}

fn haystack(request: &ApiRequest) -> String {
    let body = request.body.as_ref().map(|b| b.to_string()).unwrap_or_default();
    format!("{} {}", request.url, body)
}

#[async_trait::async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: ApiRequest) -> Result<Bytes, TransportError> {
        let target = haystack(&request);
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(request);

        let reply = self
            .routes
            .iter()
            .find(|(fragment, _)| target.contains(fragment.as_str()))
            .map(|(_, reply)| reply.clone());

        match reply {
            Some(StubReply::Json(value)) => Ok(Bytes::from(value.to_string())),
            Some(StubReply::Raw(body)) => Ok(Bytes::from(body)),
            Some(StubReply::Status(status)) => Err(TransportError::Status { status }),
            Some(StubReply::Timeout) => Err(TransportError::Timeout),
            None => Err(TransportError::Status { status: 404 }),
        }
    }
}

// Transport capability used by the backend client.
//
// The client never reaches for a global HTTP client: it is handed a transport,
// so callers can swap in a request-scoped or in-memory one.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode, Url};

use super::error::TransportError;

/// A fully built request, ready to hand to a transport.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl BackendResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub trait Transport: Send + Sync {
    fn send(&self, request: BackendRequest)
        -> BoxFuture<'_, Result<BackendResponse, TransportError>>;
}

/// Production transport over reqwest.
///
/// Redirects are not followed so that a 3xx from the backend surfaces as a
/// failed call instead of being silently chased.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { http })
    }
}

impl Transport for ReqwestTransport {
    fn send(
        &self,
        request: BackendRequest,
    ) -> BoxFuture<'_, Result<BackendResponse, TransportError>> {
        Box::pin(async move {
            let mut builder = self
                .http
                .request(request.method, request.url)
                .headers(request.headers);
            if let Some(body) = request.body {
                builder = builder.body(body);
            }
            let resp = builder.send().await?;
            let status = resp.status();
            let body = resp.bytes().await?.to_vec();
            Ok(BackendResponse { status, body })
        })
    }
}

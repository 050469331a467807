//! Outbound relay — mirrors an inbound request to the CAS backend
//!
//! Redirects are never followed: the dispatcher must observe the CAS 302
//! itself to capture the freshly issued ticket from the Location header.

use crate::error::{ProxyError, Result};
use bytes::Bytes;
use std::time::Duration;

/// Relays inbound requests to the CAS backend verbatim
pub struct Forwarder {
    client: reqwest::Client,
    timeout: Duration,
}

impl Forwarder {
    /// Create a forwarder with the default 30s upstream timeout
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a forwarder with a custom upstream timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(100)
            .build()
            .unwrap_or_default();

        Self { client, timeout }
    }

    /// Forward a request to `target_url`, mirroring method, headers and body.
    ///
    /// Returns the upstream response whatever its status: a CAS 4xx/5xx body
    /// still carries protocol-meaningful content and must reach the caller.
    pub async fn forward(
        &self,
        method: &http::Method,
        target_url: &str,
        headers: &http::HeaderMap,
        body: Bytes,
    ) -> Result<ForwardedResponse> {
        let url = reqwest::Url::parse(target_url)
            .map_err(|e| ProxyError::InvalidTarget(format!("{}: {}", target_url, e)))?;

        let mut req_builder = self.client.request(method.clone(), url);

        // Mirror headers. Hop-by-hop headers stay on this hop, and Host is
        // set by the client from the target URL so the CAS backend sees its
        // own host, not the proxy's.
        for (key, value) in headers.iter() {
            if key != http::header::HOST && !is_hop_by_hop(key.as_str()) {
                req_builder = req_builder.header(key.clone(), value.clone());
            }
        }

        req_builder = req_builder.body(body);

        let response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProxyError::UpstreamTimeout(self.timeout.as_millis() as u64)
            } else {
                ProxyError::Http(e)
            }
        })?;

        let status = response.status();
        let resp_headers = response.headers().clone();
        let resp_body = response.bytes().await.map_err(ProxyError::Http)?;

        Ok(ForwardedResponse {
            status,
            headers: resp_headers,
            body: resp_body,
        })
    }
}

impl Default for Forwarder {
    fn default() -> Self {
        Self::new()
    }
}

/// Response from the CAS backend
pub struct ForwardedResponse {
    /// HTTP status code
    pub status: reqwest::StatusCode,
    /// Response headers
    pub headers: reqwest::header::HeaderMap,
    /// Full response body
    pub body: Bytes,
}

impl ForwardedResponse {
    /// Get a response header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Check if a header is a hop-by-hop header that should not be forwarded
fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}

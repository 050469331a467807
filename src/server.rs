//! HTTP listener hosting the dispatcher
//!
//! One tokio task per accepted connection, HTTP/1.1 via hyper. The hosting
//! layer only adapts between hyper's request/response types and the
//! dispatcher's; all interception logic lives in the dispatcher.

use crate::config::ProxyConfig;
use crate::dispatcher::{Dispatcher, InterceptedRequest, ProxiedResponse};
use crate::error::{ProxyError, Result};
use crate::store;
use bytes::Bytes;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// The proxy server — binds the listener and serves connections
pub struct ProxyServer {
    config: ProxyConfig,
    dispatcher: Arc<Dispatcher>,
}

impl ProxyServer {
    /// Create a server from configuration
    pub fn new(config: ProxyConfig) -> Result<Self> {
        config.validate()?;
        let ticket_store = store::from_config(&config.ticket_store)?;
        let dispatcher = Arc::new(Dispatcher::new(&config, ticket_store)?);
        Ok(Self { config, dispatcher })
    }

    /// Bind the listener. Returns the bound address, useful when the
    /// configured port is 0.
    pub async fn bind(&self) -> Result<(TcpListener, SocketAddr)> {
        let addr: SocketAddr = self.config.listen.parse().map_err(|e| {
            ProxyError::Config(format!(
                "Invalid listen address '{}': {}",
                self.config.listen, e
            ))
        })?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ProxyError::Other(format!("Failed to bind {}: {}", addr, e)))?;
        let local = listener.local_addr()?;
        tracing::info!(address = %local, cas = self.config.cas_base_url, "Proxy listening");
        Ok((listener, local))
    }

    /// Accept and serve connections until the task is dropped
    pub async fn run(&self) -> Result<()> {
        let (listener, _) = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            let dispatcher = self.dispatcher.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let served = http1::Builder::new()
                    .serve_connection(
                        io,
                        service_fn(move |req| handle_request(req, dispatcher.clone())),
                    )
                    .await;
                if let Err(e) = served {
                    tracing::debug!(error = %e, remote = %remote_addr, "Connection ended");
                }
            });
        }
    }
}

/// Adapt one hyper request to the dispatcher and back
async fn handle_request(
    req: hyper::Request<Incoming>,
    dispatcher: Arc<Dispatcher>,
) -> std::result::Result<hyper::Response<http_body_util::Full<Bytes>>, hyper::Error> {
    let (parts, body) = req.into_parts();

    // The inbound body must arrive in full before anything is forwarded; a
    // truncated or malformed body fails the request instead of relaying a
    // mangled one to CAS.
    let body_bytes = match http_body_util::BodyExt::collect(body).await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read inbound request body");
            return Ok(empty_response(400));
        }
    };

    let intercepted = InterceptedRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(|q| q.to_string()),
        headers: parts.headers,
        body: body_bytes,
    };

    let response = match dispatcher.handle(intercepted).await {
        // Fail closed on unknown paths: empty body, no forwarding happened
        Ok(None) => empty_response(404),
        Ok(Some(proxied)) => into_hyper_response(proxied),
        Err(ProxyError::InvalidTarget(url)) => {
            tracing::error!(url, "Refusing to forward to invalid target URL");
            empty_response(502)
        }
        Err(e) => {
            tracing::error!(error = %e, "Upstream request failed");
            empty_response(502)
        }
    };

    Ok(response)
}

fn into_hyper_response(proxied: ProxiedResponse) -> hyper::Response<http_body_util::Full<Bytes>> {
    let mut response = hyper::Response::new(http_body_util::Full::new(proxied.body));
    *response.status_mut() = proxied.status;
    *response.headers_mut() = proxied.headers;
    response
}

fn empty_response(status: u16) -> hyper::Response<http_body_util::Full<Bytes>> {
    let mut response = hyper::Response::new(http_body_util::Full::new(Bytes::new()));
    *response.status_mut() =
        http::StatusCode::from_u16(status).unwrap_or(http::StatusCode::BAD_GATEWAY);
    response
}

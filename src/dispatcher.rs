//! Request dispatcher — classifies inbound requests and drives the
//! capture/consume/rewrite state machine
//!
//! Exactly three behaviors, selected by path equality (never prefix match):
//! `/login` captures a freshly issued ticket against the impersonation
//! cookie; the `/serviceValidate` family consumes the captured mapping and
//! conditionally rewrites the response; everything else is rejected without
//! forwarding, so the proxy can never be tricked into relaying itself.

use crate::authorizer::AuthorizationClient;
use crate::config::ProxyConfig;
use crate::error::Result;
use crate::forwarder::{ForwardedResponse, Forwarder};
use crate::rewriter::{self, CasProtocol};
use crate::store::TicketStore;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// Inbound request as seen by the dispatcher
pub struct InterceptedRequest {
    pub method: http::Method,
    /// URL path, e.g. `/serviceValidate`
    pub path: String,
    /// Raw query string without the leading `?`, if any
    pub query: Option<String>,
    pub headers: http::HeaderMap,
    pub body: Bytes,
}

impl InterceptedRequest {
    /// Value of a query parameter, percent-decoded is not needed here: CAS
    /// tickets and the decision endpoint receive the raw value back verbatim.
    fn query_param(&self, name: &str) -> Option<&str> {
        let query = self.query.as_deref()?;
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name).then_some(value)
        })
    }

    /// Value of a cookie from the inbound `Cookie` header(s)
    fn cookie(&self, name: &str) -> Option<String> {
        for value in self.headers.get_all(http::header::COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            for pair in raw.split(';') {
                if let Some((key, val)) = pair.trim().split_once('=') {
                    if key == name {
                        return Some(val.to_string());
                    }
                }
            }
        }
        None
    }
}

/// Response handed back to the hosting layer
pub struct ProxiedResponse {
    pub status: http::StatusCode,
    /// Upstream headers minus the ones invalidated by re-buffering the body
    pub headers: http::HeaderMap,
    pub body: Bytes,
}

/// How the dispatcher classified an inbound path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// `/login` — capture a fresh ticket for the impersonation cookie
    LoginCapture,
    /// `/serviceValidate`, `/proxyValidate` or `/validate` — consume and rewrite
    ValidateConsume,
    /// Anything else — fail closed, never forward
    Reject,
}

impl Flow {
    /// Classify by exact path equality
    pub fn classify(path: &str) -> Self {
        match path {
            "/login" => Flow::LoginCapture,
            "/serviceValidate" | "/proxyValidate" | "/validate" => Flow::ValidateConsume,
            _ => Flow::Reject,
        }
    }
}

/// Orchestrates forwarder, ticket store, rewriter and authorization client
pub struct Dispatcher {
    cas_base_url: String,
    impersonate_cookie: String,
    forwarder: Forwarder,
    store: Arc<dyn TicketStore>,
    authorizer: AuthorizationClient,
}

impl Dispatcher {
    /// Build a dispatcher from configuration and a ticket store
    pub fn new(config: &ProxyConfig, store: Arc<dyn TicketStore>) -> Result<Self> {
        Ok(Self {
            cas_base_url: config.cas_base_url.trim_end_matches('/').to_string(),
            impersonate_cookie: config.impersonate_cookie.clone(),
            forwarder: Forwarder::with_timeout(Duration::from_secs(config.upstream_timeout_secs)),
            store,
            authorizer: AuthorizationClient::new(
                &config.authorize_url,
                config.authorize_fail_policy,
            )?,
        })
    }

    /// Handle one inbound request end to end.
    ///
    /// Returns `None` for rejected paths: no forwarding happened and the
    /// hosting layer answers with an empty body.
    pub async fn handle(&self, req: InterceptedRequest) -> Result<Option<ProxiedResponse>> {
        match Flow::classify(&req.path) {
            Flow::LoginCapture => self.handle_login(req).await.map(Some),
            Flow::ValidateConsume => self.handle_validate(req).await.map(Some),
            Flow::Reject => {
                tracing::warn!(
                    path = req.path,
                    "Unknown request path, rejecting to avoid a forwarding loop"
                );
                Ok(None)
            }
        }
    }

    fn target_url(&self, req: &InterceptedRequest) -> String {
        match &req.query {
            Some(query) => format!("{}{}?{}", self.cas_base_url, req.path, query),
            None => format!("{}{}", self.cas_base_url, req.path),
        }
    }

    async fn handle_login(&self, req: InterceptedRequest) -> Result<ProxiedResponse> {
        let target_url = self.target_url(&req);
        tracing::debug!(url = target_url, "Forwarding login to CAS");

        let upstream = self
            .forwarder
            .forward(&req.method, &target_url, &req.headers, req.body.clone())
            .await?;

        match req.cookie(&self.impersonate_cookie) {
            None => {
                // Normal unimpersonated login. The upstream routing layer is
                // expected to only send impersonated flows here, so note it.
                tracing::debug!("Login without impersonation cookie, passing through");
            }
            Some(target) => match upstream.status.as_u16() {
                302 => {
                    let location = upstream.header("Location");
                    match location.and_then(ticket_from_location) {
                        Some(ticket) => {
                            tracing::info!(
                                ticket,
                                impersonate = target,
                                "Captured ticket for impersonation"
                            );
                            self.store.put(ticket, &target).await?;
                        }
                        None => {
                            tracing::debug!(
                                location = location.unwrap_or(""),
                                "Login redirect carries no ticket, nothing captured"
                            );
                        }
                    }
                }
                301 => {
                    tracing::warn!(
                        location = upstream.header("Location").unwrap_or(""),
                        "Permanent redirect from CAS on login, no ticket captured"
                    );
                }
                status => {
                    tracing::debug!(status, "Non-redirect login response, nothing captured");
                }
            },
        }

        Ok(passthrough(upstream))
    }

    async fn handle_validate(&self, req: InterceptedRequest) -> Result<ProxiedResponse> {
        // Consume before forwarding: the ticket must be single-use even if
        // the forward itself fails afterwards.
        let impersonate = match req.query_param("ticket") {
            Some(ticket) => self.store.consume(ticket).await?,
            None => None,
        };

        let target_url = self.target_url(&req);
        tracing::debug!(url = target_url, "Forwarding validation to CAS");

        let upstream = self
            .forwarder
            .forward(&req.method, &target_url, &req.headers, req.body.clone())
            .await?;

        let Some(target) = impersonate else {
            // Normal non-impersonated validation.
            tracing::debug!(path = req.path, "No pending impersonation for this ticket");
            return Ok(passthrough(upstream));
        };

        let protocol = CasProtocol::for_path(&req.path);
        let body = String::from_utf8_lossy(&upstream.body).into_owned();

        let Some(real_user) = rewriter::extract_user(protocol, &body) else {
            tracing::warn!(
                path = req.path,
                "Validation body carries no username, impersonation skipped"
            );
            return Ok(passthrough(upstream));
        };

        let service = req.query_param("service");
        if !self.authorizer.is_allowed(service, real_user).await {
            tracing::info!(
                real_user,
                impersonate = target,
                service = service.unwrap_or(""),
                "Impersonation denied by authorization endpoint"
            );
            return Ok(passthrough(upstream));
        }

        tracing::info!(
            real_user,
            impersonate = target,
            service = service.unwrap_or(""),
            "Impersonating validation response"
        );

        // extract_user matched above, so the rewrite pattern matches too
        let rewritten = rewriter::rewrite(protocol, &body, &target).unwrap_or(body);

        Ok(ProxiedResponse {
            status: upstream.status,
            headers: response_headers(&upstream.headers),
            body: Bytes::from(rewritten),
        })
    }
}

/// Extract the ticket from a redirect Location header: the substring after
/// the last `ticket=` occurrence. No occurrence means no ticket.
fn ticket_from_location(location: &str) -> Option<&str> {
    location
        .rfind("ticket=")
        .map(|idx| &location[idx + "ticket=".len()..])
}

/// Pass an upstream response through unmodified (headers still sanitized)
fn passthrough(upstream: ForwardedResponse) -> ProxiedResponse {
    ProxiedResponse {
        status: upstream.status,
        headers: response_headers(&upstream.headers),
        body: upstream.body,
    }
}

/// Copy upstream headers, dropping the ones invalidated by body re-buffering.
/// Content-length is recomputed by the hosting layer from the final body.
fn response_headers(upstream: &http::HeaderMap) -> http::HeaderMap {
    let mut headers = http::HeaderMap::new();
    for (key, value) in upstream.iter() {
        if key != http::header::CONTENT_LENGTH && key != http::header::TRANSFER_ENCODING {
            headers.append(key.clone(), value.clone());
        }
    }
    headers
}

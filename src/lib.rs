//! # CAS Impersonation Proxy
//!
//! A transparent HTTP interception proxy sitting in front of a CAS (Central
//! Authentication Service) server. It lets an operator substitute the
//! authenticated identity returned to a service for one specific login flow,
//! without modifying the CAS server itself.
//!
//! ## Architecture
//!
//! ```text
//! Listener → Dispatcher → { Forwarder, Ticket Store, Rewriter, Authorizer } → CAS
//! ```
//!
//! ## How it works
//!
//! - `/login` requests are relayed to CAS; when the redirect carries a fresh
//!   ticket and the inbound request carries the impersonation cookie, the
//!   ticket→target mapping is stored.
//! - `/serviceValidate`, `/proxyValidate` and `/validate` requests consume
//!   the mapping for their ticket (exactly once, before forwarding), then
//!   rewrite the authenticated username in the CAS response body if the
//!   external authorization endpoint allows it.
//! - Every other path is rejected without forwarding, so the proxy cannot be
//!   drawn into a forwarding loop.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cas_impersonate_proxy::{config::ProxyConfig, ProxyServer};
//!
//! #[tokio::main]
//! async fn main() -> cas_impersonate_proxy::Result<()> {
//!     let config = ProxyConfig::from_file("proxy.hcl").await?;
//!     ProxyServer::new(config)?.run().await
//! }
//! ```

pub mod authorizer;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod forwarder;
pub mod rewriter;
pub mod server;
pub mod store;

// Re-export main types
pub use error::{ProxyError, Result};
pub use server::ProxyServer;

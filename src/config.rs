//! Configuration for the CAS impersonation proxy
//!
//! Uses HCL (HashiCorp Configuration Language) as the configuration format.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::error::{ProxyError, Result};

/// Top-level proxy configuration
///
/// # HCL Example
///
/// ```hcl
/// listen                = "127.0.0.1:8080"
/// cas_base_url          = "http://localhost:8443/cas"
/// impersonate_cookie    = "CAS_TEST_IMPERSONATE"
/// authorize_url         = "https://decider.example.org/canImpersonate.php?test"
/// authorize_fail_policy = "open"
///
/// ticket_store {
///   backend = "memory"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Listen address for the inbound HTTP listener
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Base URL of the CAS server being fronted (no trailing slash needed)
    #[serde(default = "default_cas_base_url")]
    pub cas_base_url: String,

    /// Name of the inbound cookie carrying the impersonation target identity
    #[serde(default = "default_impersonate_cookie")]
    pub impersonate_cookie: String,

    /// External decision endpoint queried with `uid` and `service` parameters
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,

    /// Policy when the decision endpoint is unreachable
    #[serde(default)]
    pub authorize_fail_policy: FailPolicy,

    /// Timeout for outbound requests to the CAS backend, in seconds
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,

    /// Ticket store backend configuration
    #[serde(default)]
    pub ticket_store: TicketStoreConfig,
}

/// Behavior when the authorization endpoint cannot be reached
///
/// `Open` (the historical default) treats transport failures as "allowed",
/// trading strictness for availability. `Closed` treats them as denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailPolicy {
    #[default]
    Open,
    Closed,
}

/// Ticket store backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketStoreConfig {
    /// Backend type: "memory" or "file"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Directory for per-ticket files (file backend only)
    #[serde(default = "default_store_dir")]
    pub dir: String,

    /// Filename prefix for per-ticket files (file backend only)
    #[serde(default = "default_store_prefix")]
    pub prefix: String,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_cas_base_url() -> String {
    "http://localhost:8080/cas".to_string()
}

fn default_impersonate_cookie() -> String {
    "CAS_TEST_IMPERSONATE".to_string()
}

fn default_authorize_url() -> String {
    "https://localhost/canImpersonate.php?test".to_string()
}

fn default_upstream_timeout() -> u64 {
    30
}

fn default_store_backend() -> String {
    "memory".to_string()
}

fn default_store_dir() -> String {
    "/tmp".to_string()
}

fn default_store_prefix() -> String {
    "impersonate-".to_string()
}

impl Default for TicketStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            dir: default_store_dir(),
            prefix: default_store_prefix(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            cas_base_url: default_cas_base_url(),
            impersonate_cookie: default_impersonate_cookie(),
            authorize_url: default_authorize_url(),
            authorize_fail_policy: FailPolicy::default(),
            upstream_timeout_secs: default_upstream_timeout(),
            ticket_store: TicketStoreConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration from an HCL file.
    ///
    /// The file must contain valid HCL content regardless of extension.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ProxyError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_hcl(&content)
    }

    /// Parse configuration from an HCL string
    pub fn from_hcl(content: &str) -> Result<Self> {
        hcl::from_str(content)
            .map_err(|e| ProxyError::Config(format!("Failed to parse HCL config: {}", e)))
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<()> {
        self.listen.parse::<SocketAddr>().map_err(|e| {
            ProxyError::Config(format!("Invalid listen address '{}': {}", self.listen, e))
        })?;

        reqwest::Url::parse(&self.cas_base_url).map_err(|e| {
            ProxyError::Config(format!(
                "Invalid cas_base_url '{}': {}",
                self.cas_base_url, e
            ))
        })?;

        if self.authorize_url.is_empty() {
            return Err(ProxyError::Config("authorize_url cannot be empty".to_string()));
        }
        reqwest::Url::parse(&self.authorize_url).map_err(|e| {
            ProxyError::Config(format!(
                "Invalid authorize_url '{}': {}",
                self.authorize_url, e
            ))
        })?;

        match self.ticket_store.backend.as_str() {
            "memory" => {}
            "file" => {
                if self.ticket_store.dir.is_empty() {
                    return Err(ProxyError::Config(
                        "ticket_store file backend requires a 'dir'".to_string(),
                    ));
                }
            }
            other => {
                return Err(ProxyError::Config(format!(
                    "Unknown ticket_store backend '{}' (expected 'memory' or 'file')",
                    other
                )));
            }
        }

        Ok(())
    }
}

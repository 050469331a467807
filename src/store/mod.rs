//! Ticket store — one-shot mapping from CAS ticket to impersonation target
//!
//! A record bridges exactly one login→validate round-trip. `consume` is the
//! only read and it deletes the record, so a ticket can never be replayed
//! into a second impersonated validation (which would dead-loop redirects).

mod file;
mod memory;

pub use file::FileTicketStore;
pub use memory::MemoryTicketStore;

use crate::config::TicketStoreConfig;
use crate::error::{ProxyError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// One-shot ticket → impersonation-target store
///
/// `consume` is atomic per key: for any stored ticket, exactly one caller
/// observes the value; concurrent or repeated calls for the same key get
/// `None`. Durability across process crashes is explicitly out of scope — a
/// lost record degrades safely to a non-impersonated validation.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Store the impersonation target for a ticket, overwriting any prior value
    async fn put(&self, ticket: &str, target: &str) -> Result<()>;

    /// Fetch and delete the target for a ticket, if present
    async fn consume(&self, ticket: &str) -> Result<Option<String>>;
}

/// Build a ticket store from configuration
pub fn from_config(config: &TicketStoreConfig) -> Result<Arc<dyn TicketStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryTicketStore::new())),
        "file" => Ok(Arc::new(FileTicketStore::new(
            config.dir.as_str(),
            config.prefix.as_str(),
        ))),
        other => Err(ProxyError::Config(format!(
            "Unknown ticket_store backend '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TicketStoreConfig;

    #[test]
    fn test_from_config_memory() {
        let config = TicketStoreConfig::default();
        assert!(from_config(&config).is_ok());
    }

    #[test]
    fn test_from_config_unknown_backend() {
        let config = TicketStoreConfig {
            backend: "redis".to_string(),
            ..Default::default()
        };
        assert!(from_config(&config).is_err());
    }
}

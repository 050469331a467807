//! In-memory ticket store
//!
//! Default backend: a mutex-guarded map. `HashMap::remove` under the lock is
//! the atomic fetch-and-delete. Not durable — state is lost on restart.

use super::TicketStore;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Mutex-guarded in-memory ticket store
pub struct MemoryTicketStore {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Number of pending (unconsumed) tickets
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryTicketStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn put(&self, ticket: &str, target: &str) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .insert(ticket.to_string(), target.to_string());
        Ok(())
    }

    async fn consume(&self, ticket: &str) -> Result<Option<String>> {
        Ok(self.records.lock().unwrap().remove(ticket))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_consume_returns_value_exactly_once() {
        let store = MemoryTicketStore::new();
        store.put("ST-123", "alice").await.unwrap();

        assert_eq!(store.consume("ST-123").await.unwrap().as_deref(), Some("alice"));
        assert_eq!(store.consume("ST-123").await.unwrap(), None);
        assert_eq!(store.consume("ST-123").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_consume_absent_ticket() {
        let store = MemoryTicketStore::new();
        assert_eq!(store.consume("ST-unknown").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemoryTicketStore::new();
        store.put("ST-1", "alice").await.unwrap();
        store.put("ST-1", "carol").await.unwrap();
        assert_eq!(store.consume("ST-1").await.unwrap().as_deref(), Some("carol"));
    }

    #[tokio::test]
    async fn test_different_keys_do_not_interfere() {
        let store = MemoryTicketStore::new();
        store.put("ST-1", "alice").await.unwrap();
        store.put("ST-2", "bob").await.unwrap();

        assert_eq!(store.consume("ST-1").await.unwrap().as_deref(), Some("alice"));
        assert_eq!(store.consume("ST-2").await.unwrap().as_deref(), Some("bob"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_consume_yields_value_to_one_caller() {
        let store = Arc::new(MemoryTicketStore::new());
        store.put("ST-race", "alice").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(
                async move { store.consume("ST-race").await.unwrap() },
            ));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}

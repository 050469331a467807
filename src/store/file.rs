//! File-backed ticket store
//!
//! One file per pending ticket, `<dir>/<prefix><ticket>`, holding the target
//! identity. Survives a proxy restart between login and validate, which the
//! in-memory backend does not.
//!
//! Atomicity of `consume` comes from `rename`: each consumer renames the
//! ticket file to a caller-unique path first, so when two validations race on
//! the same ticket only one rename succeeds and the other observes absence.

use super::TicketStore;
use crate::error::Result;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

static CONSUME_SEQ: AtomicU64 = AtomicU64::new(0);

/// Per-ticket-file store
pub struct FileTicketStore {
    dir: PathBuf,
    prefix: String,
}

impl FileTicketStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    fn ticket_path(&self, ticket: &str) -> PathBuf {
        // Tickets are adversarial-facing input: a path separator inside one
        // must not escape the store directory.
        let sanitized: String = ticket
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.dir.join(format!("{}{}", self.prefix, sanitized))
    }
}

#[async_trait]
impl TicketStore for FileTicketStore {
    async fn put(&self, ticket: &str, target: &str) -> Result<()> {
        tokio::fs::write(self.ticket_path(ticket), target).await?;
        Ok(())
    }

    async fn consume(&self, ticket: &str) -> Result<Option<String>> {
        let path = self.ticket_path(ticket);
        let claimed = self.dir.join(format!(
            "{}.claimed-{}-{}",
            path.file_name().and_then(|n| n.to_str()).unwrap_or(&self.prefix),
            std::process::id(),
            CONSUME_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        match tokio::fs::rename(&path, &claimed).await {
            Ok(()) => {
                let target = tokio::fs::read_to_string(&claimed).await?;
                let _ = tokio::fs::remove_file(&claimed).await;
                Ok(Some(target))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_consume_returns_value_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTicketStore::new(dir.path(), "impersonate-");

        store.put("ST-123", "alice").await.unwrap();
        assert!(dir.path().join("impersonate-ST-123").exists());

        assert_eq!(store.consume("ST-123").await.unwrap().as_deref(), Some("alice"));
        assert_eq!(store.consume("ST-123").await.unwrap(), None);
        assert!(!dir.path().join("impersonate-ST-123").exists());
    }

    #[tokio::test]
    async fn test_consume_absent_ticket() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTicketStore::new(dir.path(), "impersonate-");
        assert_eq!(store.consume("ST-unknown").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTicketStore::new(dir.path(), "impersonate-");

        store.put("ST-1", "alice").await.unwrap();
        store.put("ST-1", "carol").await.unwrap();
        assert_eq!(store.consume("ST-1").await.unwrap().as_deref(), Some("carol"));
    }

    #[tokio::test]
    async fn test_ticket_cannot_escape_store_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTicketStore::new(dir.path(), "impersonate-");

        store.put("../evil", "alice").await.unwrap();
        assert!(dir.path().join("impersonate-.._evil").exists());
        assert_eq!(store.consume("../evil").await.unwrap().as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_concurrent_consume_yields_value_to_one_caller() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileTicketStore::new(dir.path(), "impersonate-"));
        store.put("ST-race", "alice").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
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

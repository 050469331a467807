//! Authorization client — external allow/deny decision for impersonation
//!
//! Queries a remote decision endpoint with the real user and requesting
//! service. The endpoint answers 403 to deny; any other status allows. When
//! the endpoint is unreachable the configured fail policy decides: `open`
//! (the historical behavior) allows, `closed` denies.

use crate::config::FailPolicy;
use crate::error::{ProxyError, Result};
use std::time::Duration;

/// Client for the external impersonation-authorization endpoint
pub struct AuthorizationClient {
    decision_url: String,
    fail_policy: FailPolicy,
    client: reqwest::Client,
}

impl AuthorizationClient {
    /// Create from the decision endpoint URL and fail policy
    pub fn new(decision_url: &str, fail_policy: FailPolicy) -> Result<Self> {
        if decision_url.is_empty() {
            return Err(ProxyError::Config(
                "authorize_url cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            decision_url: decision_url.to_string(),
            fail_policy,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        })
    }

    /// Create with a custom client (for testing)
    #[cfg(test)]
    fn with_client(decision_url: &str, fail_policy: FailPolicy, client: reqwest::Client) -> Self {
        Self {
            decision_url: decision_url.to_string(),
            fail_policy,
            client,
        }
    }

    /// May `real_user` be impersonated for `service`?
    ///
    /// Fresh query on every call; decisions are never cached. `service` may
    /// be absent when the validation request carried no service parameter.
    pub async fn is_allowed(&self, service: Option<&str>, real_user: &str) -> bool {
        let request = self
            .client
            .get(&self.decision_url)
            .query(&[("uid", real_user), ("service", service.unwrap_or(""))]);

        let response = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                let allowed = self.fail_policy == FailPolicy::Open;
                tracing::warn!(
                    error = %e,
                    decision_url = self.decision_url,
                    fail_policy = ?self.fail_policy,
                    allowed,
                    "Authorization endpoint unreachable"
                );
                return allowed;
            }
        };

        let denied = response.status() == reqwest::StatusCode::FORBIDDEN;
        tracing::debug!(
            status = response.status().as_u16(),
            uid = real_user,
            service = service.unwrap_or(""),
            denied,
            "Authorization decision"
        );
        !denied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_empty_url_rejected() {
        assert!(AuthorizationClient::new("", FailPolicy::Open).is_err());
    }

    #[test]
    fn test_decision_url_stored() {
        let client =
            AuthorizationClient::new("http://decider.local/can?test", FailPolicy::Open).unwrap();
        assert_eq!(client.decision_url, "http://decider.local/can?test");
    }

    /// Start a mock decision server answering with a fixed response; returns
    /// (url, receiver for the raw captured request).
    async fn start_mock_decider(
        response: &'static str,
    ) -> (String, tokio::sync::oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = vec![0u8; 4096];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                let _ = tx.send(String::from_utf8_lossy(&buf[..n]).to_string());
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (format!("http://127.0.0.1:{}/can?test", addr.port()), rx)
    }

    #[tokio::test]
    async fn test_403_denies() {
        let (url, _rx) = start_mock_decider(
            "HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n",
        )
        .await;
        let client = AuthorizationClient::new(&url, FailPolicy::Open).unwrap();
        assert!(!client.is_allowed(Some("https://svc"), "bob").await);
    }

    #[tokio::test]
    async fn test_200_allows() {
        let (url, _rx) =
            start_mock_decider("HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok").await;
        let client = AuthorizationClient::new(&url, FailPolicy::Open).unwrap();
        assert!(client.is_allowed(Some("https://svc"), "bob").await);
    }

    #[tokio::test]
    async fn test_500_allows() {
        // Anything but 403 counts as allowed.
        let (url, _rx) = start_mock_decider(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n",
        )
        .await;
        let client = AuthorizationClient::new(&url, FailPolicy::Open).unwrap();
        assert!(client.is_allowed(Some("https://svc"), "bob").await);
    }

    #[tokio::test]
    async fn test_query_parameters_are_escaped() {
        let (url, mut rx) =
            start_mock_decider("HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok").await;
        let client = AuthorizationClient::new(&url, FailPolicy::Open).unwrap();
        client
            .is_allowed(Some("https://svc/app?x=1&y=2"), "b ob")
            .await;

        let captured = rx.try_recv().unwrap();
        // Original query string survives, new parameters are appended escaped
        assert!(captured.contains("/can?test"));
        assert!(captured.contains("uid=b+ob") || captured.contains("uid=b%20ob"));
        assert!(captured.contains("service=https%3A%2F%2Fsvc%2Fapp%3Fx%3D1%26y%3D2"));
    }

    #[tokio::test]
    async fn test_transport_error_fail_open() {
        let client = AuthorizationClient::with_client(
            "http://127.0.0.1:1/can",
            FailPolicy::Open,
            reqwest::Client::builder()
                .timeout(Duration::from_millis(100))
                .build()
                .unwrap(),
        );
        assert!(client.is_allowed(Some("https://svc"), "bob").await);
    }

    #[tokio::test]
    async fn test_transport_error_fail_closed() {
        let client = AuthorizationClient::with_client(
            "http://127.0.0.1:1/can",
            FailPolicy::Closed,
            reqwest::Client::builder()
                .timeout(Duration::from_millis(100))
                .build()
                .unwrap(),
        );
        assert!(!client.is_allowed(Some("https://svc"), "bob").await);
    }
}

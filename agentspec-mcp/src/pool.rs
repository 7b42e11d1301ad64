//! The connection pool: one long-lived `Transport` per server name,
//! single-flighted so a burst of concurrent callers for the same name
//! triggers exactly one connection attempt.

use crate::error::McpError;
use crate::transport::Transport;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

type ConnectFuture = Shared<BoxFuture<'static, Result<Arc<dyn Transport>, McpError>>>;

pub struct ConnectionPool {
    inflight: Mutex<HashMap<String, ConnectFuture>>,
    connected: Mutex<HashMap<String, Arc<dyn Transport>>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
            connected: Mutex::new(HashMap::new()),
        }
    }

    /// Idempotent: a concurrent call for the same `name` shares one
    /// underlying connection attempt and its result.
    pub async fn connect<F, Fut>(&self, name: &str, connect: F) -> Result<Arc<dyn Transport>, McpError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn Transport>, McpError>> + Send + 'static,
    {
        if let Some(existing) = self.connected.lock().await.get(name) {
            return Ok(existing.clone());
        }

        let shared = {
            let mut inflight = self.inflight.lock().await;
            if let Some(existing) = inflight.get(name) {
                existing.clone()
            } else {
                let fut: BoxFuture<'static, Result<Arc<dyn Transport>, McpError>> = connect().boxed();
                let shared = fut.shared();
                inflight.insert(name.to_string(), shared.clone());
                shared
            }
        };

        let result = shared.await;
        self.inflight.lock().await.remove(name);
        if let Ok(transport) = &result {
            self.connected.lock().await.insert(name.to_string(), transport.clone());
        }
        result
    }

    pub async fn get(&self, name: &str) -> Result<Arc<dyn Transport>, McpError> {
        self.connected
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| McpError::NotConnected { name: name.to_string() })
    }

    pub async fn all(&self) -> Vec<(String, Arc<dyn Transport>)> {
        let connected = self.connected.lock().await;
        let mut all: Vec<_> = connected.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Best-effort: attempts to close every member, returning the first
    /// error encountered (if any) after every close has been attempted.
    pub async fn close(&self) -> Result<(), McpError> {
        let mut connected = self.connected.lock().await;
        let mut first_error = None;
        for (_, transport) in connected.drain() {
            if let Err(e) = transport.close().await {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubTransport;

    #[async_trait::async_trait]
    impl Transport for StubTransport {
        async fn call(&self, _method: &str, _params: Value) -> Result<Value, McpError> {
            Ok(Value::Null)
        }

        async fn close(&self) -> Result<(), McpError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn concurrent_connects_for_the_same_name_share_one_attempt() {
        let pool = Arc::new(ConnectionPool::new());
        let attempts = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            let attempts = attempts.clone();
            handles.push(tokio::spawn(async move {
                pool.connect("fs", move || {
                    let attempts = attempts.clone();
                    async move {
                        attempts.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok::<Arc<dyn Transport>, McpError>(Arc::new(StubTransport))
                    }
                })
                .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_before_connect_is_an_error() {
        let pool = ConnectionPool::new();
        let err = match pool.get("missing").await {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, McpError::NotConnected { .. }));
    }

    #[tokio::test]
    async fn all_returns_sorted_snapshot() {
        let pool = ConnectionPool::new();
        pool.connect("zeta", || async { Ok::<Arc<dyn Transport>, McpError>(Arc::new(StubTransport)) })
            .await
            .unwrap();
        pool.connect("alpha", || async { Ok::<Arc<dyn Transport>, McpError>(Arc::new(StubTransport)) })
            .await
            .unwrap();
        let names: Vec<String> = pool.all().await.into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }
}

//! In-process shared store
//!
//! Clones share one set of values, so several poll instances built on
//! clones of the same `MemoryRemote` behave like browsers attached to one
//! realtime database. Writes and subscriptions can be made to fail for
//! fault-injection.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;

use super::{RemoteError, RemoteStore, SnapshotReceiver};

#[derive(Default)]
struct Inner {
    values: HashMap<String, Value>,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<Value>>>,
    failing_prefixes: Vec<String>,
    refuse_subscriptions: bool,
}

#[derive(Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current value at `path` (`null` when unset)
    pub fn get(&self, path: &str) -> Value {
        self.lock().values.get(path).cloned().unwrap_or(Value::Null)
    }

    /// Make writes to paths starting with `prefix` fail
    pub fn fail_writes_to(&self, prefix: &str) {
        self.lock().failing_prefixes.push(prefix.to_string());
    }

    /// Make every new subscription fail as if the store were unreachable
    pub fn fail_subscriptions(&self) {
        self.lock().refuse_subscriptions = true;
    }

    /// Stop injecting write and subscription failures
    pub fn heal(&self) {
        let mut inner = self.lock();
        inner.failing_prefixes.clear();
        inner.refuse_subscriptions = false;
    }

    /// Number of live subscriptions on `path`
    pub fn subscriber_count(&self, path: &str) -> usize {
        self.lock()
            .subscribers
            .get(path)
            .map(|subs| subs.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn set(&self, path: &str, value: &Value) -> Result<(), RemoteError> {
        let mut inner = self.lock();

        if inner.failing_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return Err(RemoteError::Rejected(path.to_string()));
        }

        inner.values.insert(path.to_string(), value.clone());
        if let Some(subs) = inner.subscribers.get_mut(path) {
            subs.retain(|tx| tx.send(value.clone()).is_ok());
            debug!("memory remote: '{}' delivered to {} subscribers", path, subs.len());
        }
        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<SnapshotReceiver, RemoteError> {
        let mut inner = self.lock();
        if inner.refuse_subscriptions {
            return Err(RemoteError::Unavailable(format!(
                "cannot subscribe to '{}'",
                path
            )));
        }
        let (tx, rx) = mpsc::unbounded_channel();

        let current = inner.values.get(path).cloned().unwrap_or(Value::Null);
        // Receiver is alive, so the initial send cannot fail.
        let _ = tx.send(current);

        inner
            .subscribers
            .entry(path.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }
}

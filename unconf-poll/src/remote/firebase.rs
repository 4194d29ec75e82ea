//! Firebase Realtime Database transport over the REST API
//!
//! Writes are `PUT {database_url}/{path}.json`. Subscriptions use the REST
//! streaming endpoint (`GET` with `Accept: text/event-stream`), whose
//! `put`/`patch` events describe changes relative to the subscribed path.
//! Each subscription keeps a cached copy of its path and emits the whole
//! cached value after every change.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::sse::{SseEvent, SseLineParser};
use super::{RemoteError, RemoteStore, SnapshotReceiver};

const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Limit on waiting for a subscription's response headers
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of a streaming `put` or `patch` event
#[derive(Debug, Deserialize)]
struct StreamPayload {
    path: String,
    data: Value,
}

#[derive(Clone)]
pub struct FirebaseRemote {
    client: reqwest::Client,
    database_url: String,
    auth: Option<String>,
    subscribe_timeout: Duration,
}

impl FirebaseRemote {
    pub fn new(database_url: &str, auth: Option<String>) -> Result<Self, RemoteError> {
        let database_url = database_url.trim().trim_end_matches('/').to_string();
        if !database_url.starts_with("http://") && !database_url.starts_with("https://") {
            return Err(RemoteError::Unavailable(format!(
                "database URL must be http(s): '{}'",
                database_url
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("unconf-poll/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            database_url,
            auth,
            subscribe_timeout: SUBSCRIBE_TIMEOUT,
        })
    }

    pub fn with_subscribe_timeout(mut self, timeout: Duration) -> Self {
        self.subscribe_timeout = timeout;
        self
    }

    /// REST URL of a path
    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.database_url, path.trim_matches('/'))
    }

    /// Request for a path, carrying the auth token as a query parameter
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.request(method, self.url(path));
        match &self.auth {
            Some(auth) => request.query(&[("auth", auth)]),
            None => request,
        }
    }
}

#[async_trait]
impl RemoteStore for FirebaseRemote {
    fn name(&self) -> &'static str {
        "firebase"
    }

    async fn set(&self, path: &str, value: &Value) -> Result<(), RemoteError> {
        let response = self
            .request(reqwest::Method::PUT, path)
            .timeout(WRITE_TIMEOUT)
            .json(value)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Http {
                status: status.as_u16(),
                body,
            });
        }
        debug!("firebase: wrote '{}'", path);
        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<SnapshotReceiver, RemoteError> {
        // The stream itself is unbounded; only the wait for headers is limited.
        let pending = self
            .request(reqwest::Method::GET, path)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send();
        let response = tokio::time::timeout(self.subscribe_timeout, pending)
            .await
            .map_err(|_| {
                RemoteError::Unavailable(format!(
                    "no response subscribing to '{}' within {:?}",
                    path, self.subscribe_timeout
                ))
            })??;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Http {
                status: status.as_u16(),
                body,
            });
        }

        info!("firebase: subscribed to '{}'", path);

        let (tx, rx) = mpsc::unbounded_channel();
        let path = path.to_string();
        let mut bytes = Box::pin(response.bytes_stream());

        tokio::spawn(async move {
            let mut parser = SseLineParser::new();
            let mut cache = StreamCache::default();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!("firebase: stream for '{}' failed: {}", path, e);
                        return;
                    }
                };

                for event in parser.push(&chunk) {
                    match cache.apply(&event) {
                        StreamStep::Snapshot(value) => {
                            if tx.send(value).is_err() {
                                debug!("firebase: subscriber for '{}' dropped", path);
                                return;
                            }
                        }
                        StreamStep::Ignore => {}
                        StreamStep::End(reason) => {
                            warn!("firebase: subscription to '{}' ended: {}", path, reason);
                            return;
                        }
                    }
                }
            }

            if let Some(event) = parser.flush() {
                if let StreamStep::Snapshot(value) = cache.apply(&event) {
                    let _ = tx.send(value);
                }
            }
            warn!("firebase: stream for '{}' closed by server", path);
        });

        Ok(rx)
    }
}

/// What one streaming event means for the subscriber
#[derive(Debug, PartialEq)]
enum StreamStep {
    Snapshot(Value),
    Ignore,
    End(String),
}

/// Cached value of one subscribed path
#[derive(Debug, Default)]
struct StreamCache {
    root: Value,
}

impl StreamCache {
    fn apply(&mut self, event: &SseEvent) -> StreamStep {
        match event.event_type.as_deref() {
            Some("put") | Some("patch") => {
                let payload: StreamPayload = match serde_json::from_str(&event.data) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("firebase: malformed stream payload: {}", e);
                        return StreamStep::Ignore;
                    }
                };
                if event.event_type.as_deref() == Some("put") {
                    apply_put(&mut self.root, &payload.path, payload.data);
                } else {
                    match payload.data {
                        Value::Object(map) => apply_patch(&mut self.root, &payload.path, map),
                        other => apply_put(&mut self.root, &payload.path, other),
                    }
                }
                StreamStep::Snapshot(self.root.clone())
            }
            Some("keep-alive") => StreamStep::Ignore,
            Some("cancel") => StreamStep::End(format!("cancelled: {}", event.data)),
            Some("auth_revoked") => StreamStep::End("auth revoked".to_string()),
            other => {
                debug!("firebase: ignoring stream event {:?}", other);
                StreamStep::Ignore
            }
        }
    }
}

/// Replace the value at `path` below `root`; `null` deletes it
fn apply_put(root: &mut Value, path: &str, data: Value) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if data.is_null() {
        if remove_path(root, &segments) {
            *root = Value::Null;
        }
        return;
    }

    let Some((last, parents)) = segments.split_last() else {
        *root = data;
        return;
    };

    let mut node = root;
    for segment in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return,
        };
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        map.insert(last.to_string(), data);
    }
}

/// Delete the value at `segments` below `node`
///
/// Missing parents are left missing, and objects emptied by the delete are
/// removed as the database does. Returns true when `node` itself is left
/// with nothing in it.
fn remove_path(node: &mut Value, segments: &[&str]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return true;
    };
    let Value::Object(map) = node else {
        return false;
    };

    if rest.is_empty() {
        if map.remove(*first).is_none() {
            return false;
        }
    } else {
        let Some(child) = map.get_mut(*first) else {
            return false;
        };
        if !remove_path(child, rest) {
            return false;
        }
        map.remove(*first);
    }
    map.is_empty()
}

/// Apply each child of `children` as a put relative to `path`
fn apply_patch(root: &mut Value, path: &str, children: Map<String, Value>) {
    let base = path.trim_end_matches('/');
    for (key, value) in children {
        apply_put(root, &format!("{}/{}", base, key), value);
    }
}

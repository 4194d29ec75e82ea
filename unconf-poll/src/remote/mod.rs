//! Shared real-time store transports
//!
//! A remote store holds JSON values at slash-separated paths. Writes are
//! unconditional full overwrites; subscriptions deliver the full value at
//! a path (never a delta) whenever it changes, in write order per path.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use unconf_common::ClientIdentity;

mod firebase;
mod memory;
pub mod sse;

pub use firebase::FirebaseRemote;
pub use memory::MemoryRemote;

/// Aggregate tally record shared by every client
pub const VOTES_PATH: &str = "votes";

/// Path of one client's selection record
pub fn user_votes_path(identity: &ClientIdentity) -> String {
    format!("userVotes/{}", identity)
}

/// Full-value snapshots for one path, in delivery order
pub type SnapshotReceiver = mpsc::UnboundedReceiver<Value>;

/// Remote transport errors
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Write rejected for '{0}'")]
    Rejected(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        RemoteError::Network(e.to_string())
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short transport name for logs
    fn name(&self) -> &'static str;

    /// Overwrite the value at `path`
    async fn set(&self, path: &str, value: &Value) -> Result<(), RemoteError>;

    /// Subscribe to full-value snapshots of `path`
    ///
    /// The current value (`null` when nothing is stored) is delivered
    /// first. The subscription lives until the receiver is dropped or the
    /// transport ends it.
    async fn subscribe(&self, path: &str) -> Result<SnapshotReceiver, RemoteError>;
}

//! Remote sync adapter
//!
//! Bridges the local vote store to an optional shared store. After every
//! vote change the whole tally is written to `votes` and the whole
//! selection to `userVotes/{identity}`; both are unconditional overwrites,
//! so concurrent writers lose updates (last writer wins).
//!
//! Without a remote store, or for the aggregate record when its write
//! fails, on-device storage is written instead. A failed selection write
//! is only logged.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use unconf_common::events::{EventBus, PollEvent};
use unconf_common::{ClientIdentity, Error, Result};

use crate::remote::{user_votes_path, RemoteStore, SnapshotReceiver, VOTES_PATH};
use crate::store::LocalVoteStore;

/// Snapshot delivered by a remote subscription
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Full value of the aggregate `votes` record
    Aggregate(Value),
    /// Full value of this client's own selection record
    Selection(Value),
}

/// Where a push ended up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushReport {
    pub remote_tally: bool,
    pub remote_selection: bool,
    pub local: bool,
}

/// Remote store plus the identity keying this client's selection record
struct RemoteLink {
    store: Arc<dyn RemoteStore>,
    identity: ClientIdentity,
}

pub struct RemoteSyncAdapter {
    remote: Option<RemoteLink>,
}

impl RemoteSyncAdapter {
    /// Adapter persisting to on-device storage only
    ///
    /// No client identity is needed without a shared store.
    pub fn local_only() -> Self {
        Self { remote: None }
    }

    pub fn with_remote(store: Arc<dyn RemoteStore>, identity: ClientIdentity) -> Self {
        Self {
            remote: Some(RemoteLink { store, identity }),
        }
    }

    pub fn identity(&self) -> Option<&ClientIdentity> {
        self.remote.as_ref().map(|link| &link.identity)
    }

    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Subscribe to the aggregate record and this client's selection record
    ///
    /// Snapshots from both are forwarded to `inbound` until either side
    /// goes away. Fails with `RemoteUnavailable` when there is no remote
    /// store or a subscription cannot be opened; the caller keeps running
    /// on local state.
    pub async fn start(&self, inbound: mpsc::UnboundedSender<Inbound>) -> Result<()> {
        let Some(RemoteLink { store: remote, identity }) = &self.remote else {
            return Err(Error::RemoteUnavailable("no remote store configured".to_string()));
        };

        let own_path = user_votes_path(identity);
        let aggregate = remote
            .subscribe(VOTES_PATH)
            .await
            .map_err(|e| Error::RemoteUnavailable(e.to_string()))?;
        let selection = remote
            .subscribe(&own_path)
            .await
            .map_err(|e| Error::RemoteUnavailable(e.to_string()))?;

        tokio::spawn(forward(aggregate, inbound.clone(), Inbound::Aggregate));
        tokio::spawn(forward(selection, inbound, Inbound::Selection));

        info!(
            "Subscribed to '{}' and '{}' on {} store",
            VOTES_PATH,
            own_path,
            remote.name()
        );
        Ok(())
    }

    /// [`start`](Self::start), reporting the outcome as a `RemoteStatus` event
    ///
    /// Returns whether subscriptions are live. A failure leaves the poll
    /// running on local state.
    pub async fn connect(&self, inbound: mpsc::UnboundedSender<Inbound>, bus: &EventBus) -> bool {
        let (connected, detail) = match self.start(inbound).await {
            Ok(()) => (true, "subscribed".to_string()),
            Err(e) => {
                if self.is_remote() {
                    warn!("Remote subscriptions failed, running on local state: {}", e);
                }
                (false, e.to_string())
            }
        };

        bus.emit_lossy(PollEvent::RemoteStatus {
            connected,
            detail,
            timestamp: chrono::Utc::now(),
        });
        connected
    }

    /// Propagate the store's current tally and selection
    pub async fn push(&self, store: &LocalVoteStore) -> PushReport {
        let mut report = PushReport::default();

        let Some(RemoteLink { store: remote, identity }) = &self.remote else {
            match store.persist().await {
                Ok(()) => report.local = true,
                Err(e) => warn!("Failed to persist votes locally: {}", e),
            }
            return report;
        };

        match push_value(remote.as_ref(), VOTES_PATH, store.full_tally()).await {
            Ok(()) => report.remote_tally = true,
            Err(e) => {
                warn!("{}; keeping votes on this device", e);
                match store.persist().await {
                    Ok(()) => report.local = true,
                    Err(e) => warn!("Failed to persist votes locally: {}", e),
                }
            }
        }

        let own_path = user_votes_path(identity);
        match push_value(remote.as_ref(), &own_path, store.selection()).await {
            Ok(()) => report.remote_selection = true,
            Err(e) => warn!("{}; selection not shared", e),
        }

        debug!("Push finished: {:?}", report);
        report
    }
}

async fn push_value<T: serde::Serialize>(
    remote: &dyn RemoteStore,
    path: &str,
    record: &T,
) -> Result<()> {
    let value = serde_json::to_value(record)?;
    remote
        .set(path, &value)
        .await
        .map_err(|e| Error::RemoteWriteFailed(format!("'{}': {}", path, e)))
}

async fn forward(
    mut snapshots: SnapshotReceiver,
    inbound: mpsc::UnboundedSender<Inbound>,
    wrap: fn(Value) -> Inbound,
) {
    while let Some(value) = snapshots.recv().await {
        if inbound.send(wrap(value)).is_err() {
            return;
        }
    }
    warn!("Remote subscription ended");
}

//! Test helpers for unconf-poll integration tests
//!
//! Provides:
//! - RecordingView: WidgetView that records every marker toggle and render
//! - Builders for widgets over in-memory storage, with or without a
//!   shared MemoryRemote

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use unconf_common::db::{init_memory_database, LocalStorage};
use unconf_common::events::EventBus;
use unconf_common::{Catalog, Category, ClientIdentity, Projection, SessionId};
use unconf_poll::remote::MemoryRemote;
use unconf_poll::store::LocalVoteStore;
use unconf_poll::sync::{Inbound, RemoteSyncAdapter};
use unconf_poll::view::WidgetView;
use unconf_poll::PollWidget;

/// One call made on the view
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCall {
    Marker {
        session: SessionId,
        category: Category,
        voted: bool,
    },
    Render {
        category: Category,
        results: Projection,
    },
}

/// View recording calls into a shared log
///
/// Clones share the log, so a test can keep one clone while the widget
/// (or the poll loop) owns another.
#[derive(Clone, Default)]
pub struct RecordingView {
    calls: Arc<Mutex<Vec<ViewCall>>>,
}

impl RecordingView {
    pub fn calls(&self) -> Vec<ViewCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Buttons showing the marker after replaying every toggle
    pub fn shown_markers(&self) -> BTreeSet<(Category, String)> {
        let mut shown = BTreeSet::new();
        for call in self.calls() {
            if let ViewCall::Marker {
                session,
                category,
                voted,
            } = call
            {
                let key = (category, session.as_str().to_string());
                if voted {
                    shown.insert(key);
                } else {
                    shown.remove(&key);
                }
            }
        }
        shown
    }

    /// Most recent content rendered into each results container
    pub fn rendered(&self) -> BTreeMap<Category, Projection> {
        let mut latest = BTreeMap::new();
        for call in self.calls() {
            if let ViewCall::Render { category, results } = call {
                latest.insert(category, results);
            }
        }
        latest
    }
}

impl WidgetView for RecordingView {
    fn set_voted_marker(&mut self, session: &SessionId, category: Category, voted: bool) {
        self.calls.lock().unwrap().push(ViewCall::Marker {
            session: session.clone(),
            category,
            voted,
        });
    }

    fn render_results(&mut self, category: Category, results: &Projection) {
        self.calls.lock().unwrap().push(ViewCall::Render {
            category,
            results: results.clone(),
        });
    }
}

/// Three-session catalog `a`, `b`, `c`
pub fn small_catalog() -> Arc<Catalog> {
    Arc::new(Catalog::from_pairs([("a", "Session A"), ("b", "Session B"), ("c", "Session C")]).unwrap())
}

pub async fn memory_storage() -> LocalStorage {
    LocalStorage::new(init_memory_database().await.unwrap())
}

/// Widget persisting to in-memory storage only
pub async fn local_widget(
    catalog: Arc<Catalog>,
) -> (PollWidget<RecordingView>, RecordingView, LocalStorage) {
    let storage = memory_storage().await;
    let store = LocalVoteStore::new(catalog, storage.clone());
    let sync = RemoteSyncAdapter::local_only();
    let view = RecordingView::default();
    let widget = PollWidget::new(store, sync, view.clone(), EventBus::new(64));
    (widget, view, storage)
}

/// Widget attached to `remote` as client `client_id`
pub async fn remote_widget(
    catalog: Arc<Catalog>,
    remote: &MemoryRemote,
    client_id: &str,
) -> (PollWidget<RecordingView>, RecordingView, LocalStorage) {
    let storage = memory_storage().await;
    let store = LocalVoteStore::new(catalog, storage.clone());
    let sync = RemoteSyncAdapter::with_remote(
        Arc::new(remote.clone()),
        ClientIdentity::from_raw(client_id),
    );
    let view = RecordingView::default();
    let widget = PollWidget::new(store, sync, view.clone(), EventBus::new(64));
    (widget, view, storage)
}

/// Next inbound snapshot, failing the test after one second
pub async fn next_inbound(rx: &mut mpsc::UnboundedReceiver<Inbound>) -> Inbound {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for snapshot")
        .expect("inbound channel closed")
}

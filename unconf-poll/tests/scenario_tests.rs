//! End-to-end poll scenarios
//!
//! Drive `PollWidget` through votes and remote snapshots and check what
//! the view shows, what is stored on the device and what reaches the
//! shared store.

mod helpers;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use helpers::*;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use unconf_common::db::{
    init_database, LocalStorage, CLIENT_ID_KEY, DATABASE_FILE_NAME, USER_VOTES_KEY, VOTES_KEY,
};
use unconf_common::events::{EventBus, PollEvent};
use unconf_common::{Catalog, Category, Error};
use unconf_poll::remote::{MemoryRemote, RemoteStore};
use unconf_poll::store::LocalVoteStore;
use unconf_poll::sync::{Inbound, RemoteSyncAdapter};
use unconf_poll::{spawn_poll_loop, PollWidget};

// =============================================================================
// Voting
// =============================================================================

#[tokio::test]
async fn test_at_most_one_marker_per_category() {
    let (mut widget, view, _storage) = local_widget(small_catalog()).await;

    let sequence = [
        (Category::Scary, "a"),
        (Category::Work, "a"),
        (Category::Scary, "b"),
        (Category::Engagement, "c"),
        (Category::Scary, "c"),
        (Category::Work, "a"),
        (Category::Work, "b"),
    ];

    for (category, session) in sequence {
        widget.vote(category, session).await.unwrap();

        let shown = view.shown_markers();
        let mut per_category: BTreeMap<Category, usize> = BTreeMap::new();
        for (category, _) in &shown {
            *per_category.entry(*category).or_default() += 1;
        }
        assert!(per_category.values().all(|n| *n <= 1), "shown: {:?}", shown);

        let tracked: BTreeSet<_> = widget
            .markers()
            .iter()
            .map(|(c, s)| (c, s.as_str().to_string()))
            .collect();
        assert_eq!(shown, tracked);
    }

    let shown = view.shown_markers();
    assert_eq!(
        shown,
        BTreeSet::from([
            (Category::Scary, "c".to_string()),
            (Category::Work, "b".to_string()),
            (Category::Engagement, "c".to_string()),
        ])
    );
}

#[tokio::test]
async fn test_revote_changes_nothing() {
    let remote = MemoryRemote::new();
    let (mut widget, view, _storage) = remote_widget(small_catalog(), &remote, "x").await;

    widget.vote(Category::Scary, "a").await.unwrap();
    let tally = widget.store().full_tally().clone();

    // Any push from here on would overwrite the sentinel
    remote.set("votes", &json!("sentinel")).await.unwrap();
    view.clear();

    let receipt = widget.vote(Category::Scary, "a").await.unwrap();

    assert!(!receipt.changed);
    assert_eq!(receipt.previous, None);
    assert_eq!(receipt.results.pairs(), vec![("a", 1)]);
    assert_eq!(widget.store().full_tally(), &tally);
    assert!(view.calls().is_empty());
    assert_eq!(remote.get("votes"), json!("sentinel"));
}

#[tokio::test]
async fn test_switch_conserves_category_total() {
    let (mut widget, _view, _storage) = local_widget(small_catalog()).await;
    widget.handle_inbound(Inbound::Aggregate(json!({"scary": {"a": 2, "b": 1}})));

    widget.vote(Category::Scary, "a").await.unwrap();
    assert_eq!(widget.store().full_tally().total(Category::Scary), 4);

    let receipt = widget.vote(Category::Scary, "b").await.unwrap();

    assert!(receipt.changed);
    assert_eq!(receipt.previous.as_ref().map(|s| s.as_str()), Some("a"));
    let tally = widget.store().full_tally();
    assert_eq!(tally.total(Category::Scary), 4);
    assert_eq!(tally.count(Category::Scary, "a"), 2);
    assert_eq!(tally.count(Category::Scary, "b"), 2);
}

#[tokio::test]
async fn test_unknown_session_rejected_without_side_effects() {
    let (mut widget, view, storage) = local_widget(small_catalog()).await;

    let err = widget.vote(Category::Work, "keynote").await.unwrap_err();

    assert!(matches!(err, Error::InvalidSession(_)));
    assert!(view.calls().is_empty());
    assert!(storage.get_item(VOTES_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn test_vote_renders_every_category() {
    let (mut widget, view, _storage) = local_widget(small_catalog()).await;

    widget.vote(Category::Engagement, "b").await.unwrap();

    let rendered = view.rendered();
    assert_eq!(rendered.len(), 3);
    assert_eq!(rendered[&Category::Engagement].pairs(), vec![("b", 1)]);
    assert!(rendered[&Category::Scary].is_placeholder());
    assert!(rendered[&Category::Work].is_placeholder());
}

// =============================================================================
// Results projection
// =============================================================================

#[tokio::test]
async fn test_results_drop_zero_rows_and_rank_by_count() {
    let (mut widget, view, _storage) = local_widget(small_catalog()).await;

    widget.handle_inbound(Inbound::Aggregate(json!({"scary": {"a": 3, "b": 0, "c": 5}})));

    let rendered = view.rendered();
    assert_eq!(rendered[&Category::Scary].pairs(), vec![("c", 5), ("a", 3)]);
    // Categories absent from the snapshot are not re-rendered
    assert!(!rendered.contains_key(&Category::Work));
}

#[tokio::test]
async fn test_all_zero_category_shows_placeholder() {
    let (mut widget, view, _storage) = local_widget(small_catalog()).await;

    widget.handle_inbound(Inbound::Aggregate(json!({"work": {"a": 0, "b": 0}})));

    assert!(view.rendered()[&Category::Work].is_placeholder());
    assert!(widget.projection(Category::Work).rows().is_empty());
}

// =============================================================================
// Remote synchronization
// =============================================================================

#[tokio::test]
async fn test_concurrent_votes_lose_an_update() {
    let catalog = small_catalog();
    let remote = MemoryRemote::new();
    let seed = json!({"scary": {"a": 2}});
    remote.set("votes", &seed).await.unwrap();

    let (mut x, _, _) = remote_widget(catalog.clone(), &remote, "x").await;
    let (mut y, _, _) = remote_widget(catalog, &remote, "y").await;
    x.handle_inbound(Inbound::Aggregate(seed.clone()));
    y.handle_inbound(Inbound::Aggregate(seed));

    // Neither client sees the other's write before voting
    x.vote(Category::Scary, "a").await.unwrap();
    y.vote(Category::Scary, "b").await.unwrap();

    let votes = remote.get("votes");
    assert_eq!(votes["scary"]["a"], json!(2));
    assert_eq!(votes["scary"]["b"], json!(1));
    assert_eq!(remote.get("userVotes/x")["scary"], json!("a"));
    assert_eq!(remote.get("userVotes/y")["scary"], json!("b"));
}

#[tokio::test]
async fn test_other_clients_vote_reaches_results() {
    let catalog = small_catalog();
    let remote = MemoryRemote::new();
    let (mut x, _, _) = remote_widget(catalog.clone(), &remote, "x").await;
    let (mut y, y_view, _) = remote_widget(catalog, &remote, "y").await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    y.sync().start(tx).await.unwrap();
    for _ in 0..2 {
        let initial = next_inbound(&mut rx).await;
        y.handle_inbound(initial);
    }

    x.vote(Category::Scary, "c").await.unwrap();

    let snapshot = next_inbound(&mut rx).await;
    assert!(matches!(snapshot, Inbound::Aggregate(_)));
    y.handle_inbound(snapshot);

    assert_eq!(y_view.rendered()[&Category::Scary].pairs(), vec![("c", 1)]);
    assert!(y_view.shown_markers().is_empty());
    assert_eq!(y.store().current_selection(Category::Scary), None);
}

#[tokio::test]
async fn test_failed_aggregate_write_keeps_votes_on_device() {
    let remote = MemoryRemote::new();
    remote.fail_writes_to("votes");
    let (mut widget, view, storage) = remote_widget(small_catalog(), &remote, "x").await;

    let receipt = widget.vote(Category::Work, "b").await.unwrap();

    assert!(receipt.changed);
    assert_eq!(remote.get("votes"), Value::Null);
    assert_eq!(remote.get("userVotes/x")["work"], json!("b"));
    assert!(storage.get_item(VOTES_KEY).await.unwrap().is_some());
    assert_eq!(view.rendered()[&Category::Work].pairs(), vec![("b", 1)]);
}

#[tokio::test]
async fn test_unreachable_remote_degrades_to_device_storage() {
    let remote = MemoryRemote::new();
    remote.fail_subscriptions();
    remote.fail_writes_to("");
    let (mut widget, view, storage) = remote_widget(small_catalog(), &remote, "x").await;
    let bus = EventBus::new(16);
    let mut events = bus.subscribe();

    let (tx, _rx) = mpsc::unbounded_channel();
    let err = widget.sync().start(tx.clone()).await.unwrap_err();
    assert!(matches!(err, Error::RemoteUnavailable(_)));
    assert!(!widget.sync().connect(tx, &bus).await);
    assert!(matches!(
        events.try_recv().unwrap(),
        PollEvent::RemoteStatus { connected: false, .. }
    ));

    let receipt = widget.vote(Category::Scary, "b").await.unwrap();

    assert!(receipt.changed);
    assert_eq!(receipt.results.pairs(), vec![("b", 1)]);
    assert_eq!(view.rendered()[&Category::Scary].pairs(), vec![("b", 1)]);
    assert_eq!(
        view.shown_markers(),
        BTreeSet::from([(Category::Scary, "b".to_string())])
    );
    let stored_tally: Value =
        serde_json::from_str(&storage.get_item(VOTES_KEY).await.unwrap().unwrap()).unwrap();
    assert_eq!(stored_tally["scary"]["b"], json!(1));
    let stored_selection: Value =
        serde_json::from_str(&storage.get_item(USER_VOTES_KEY).await.unwrap().unwrap()).unwrap();
    assert_eq!(stored_selection["scary"], json!("b"));
    assert_eq!(remote.get("votes"), Value::Null);
}

#[tokio::test]
async fn test_local_only_poll_never_creates_identity() {
    let (mut widget, _view, storage) = local_widget(small_catalog()).await;

    widget.vote(Category::Work, "a").await.unwrap();

    assert_eq!(widget.snapshot().client_id, None);
    assert!(storage.get_item(CLIENT_ID_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn test_own_remote_selection_restores_markers() {
    let remote = MemoryRemote::new();
    remote
        .set("userVotes/me", &json!({"work": "agentic-ai", "scary": null}))
        .await
        .unwrap();
    let (mut widget, view, _storage) =
        remote_widget(Arc::new(Catalog::unconference()), &remote, "me").await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    widget.sync().start(tx).await.unwrap();
    for _ in 0..2 {
        let snapshot = next_inbound(&mut rx).await;
        widget.handle_inbound(snapshot);
    }

    assert_eq!(
        view.shown_markers(),
        BTreeSet::from([(Category::Work, "agentic-ai".to_string())])
    );
    assert_eq!(
        widget.store().current_selection(Category::Work).map(|s| s.as_str()),
        Some("agentic-ai")
    );
}

#[tokio::test]
async fn test_null_own_record_keeps_local_selection() {
    let (mut widget, view, _storage) = local_widget(small_catalog()).await;
    widget.vote(Category::Scary, "a").await.unwrap();

    widget.handle_inbound(Inbound::Selection(Value::Null));

    assert_eq!(
        view.shown_markers(),
        BTreeSet::from([(Category::Scary, "a".to_string())])
    );
}

#[tokio::test]
async fn test_malformed_snapshot_is_dropped() {
    let (mut widget, view, _storage) = local_widget(small_catalog()).await;
    widget.vote(Category::Scary, "a").await.unwrap();
    let tally = widget.store().full_tally().clone();
    view.clear();

    widget.handle_inbound(Inbound::Aggregate(json!([1, 2, 3])));
    widget.handle_inbound(Inbound::Selection(json!("scary")));

    assert_eq!(widget.store().full_tally(), &tally);
    assert!(view.calls().is_empty());
}

// =============================================================================
// Reload
// =============================================================================

#[tokio::test]
async fn test_reload_restores_selection_and_results() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join(DATABASE_FILE_NAME);
    let catalog = Arc::new(Catalog::unconference());

    {
        let storage = LocalStorage::new(init_database(&db_path).await.unwrap());
        let store = LocalVoteStore::load(catalog.clone(), storage.clone())
            .await
            .unwrap();
        let sync = RemoteSyncAdapter::local_only();
        let mut widget =
            PollWidget::new(store, sync, RecordingView::default(), EventBus::new(16));
        widget.vote(Category::Scary, "vibe-coding").await.unwrap();
        drop(widget);
        storage.pool().close().await;
    }

    let storage = LocalStorage::new(init_database(&db_path).await.unwrap());
    let store = LocalVoteStore::load(catalog, storage).await.unwrap();
    let sync = RemoteSyncAdapter::local_only();
    let view = RecordingView::default();
    let mut widget = PollWidget::new(store, sync, view.clone(), EventBus::new(16));

    widget.restore();

    assert_eq!(
        view.shown_markers(),
        BTreeSet::from([(Category::Scary, "vibe-coding".to_string())])
    );
    let rendered = view.rendered();
    assert_eq!(rendered[&Category::Scary].pairs(), vec![("vibe-coding", 1)]);
    assert!(rendered[&Category::Work].is_placeholder());
    assert!(rendered[&Category::Engagement].is_placeholder());
}

// =============================================================================
// Event loop
// =============================================================================

#[tokio::test]
async fn test_poll_loop_serves_commands_and_snapshots() {
    let (widget, view, _storage) = local_widget(small_catalog()).await;
    let (tx, rx) = mpsc::unbounded_channel();
    let (handle, task) = spawn_poll_loop(widget, rx);

    tx.send(Inbound::Aggregate(json!({"work": {"b": 4}}))).unwrap();

    let mut folded = false;
    for _ in 0..100 {
        let snapshot = handle.snapshot().await.unwrap();
        if snapshot.tally.count(Category::Work, "b") == 4 {
            folded = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(folded, "aggregate snapshot never folded");

    let receipt = handle.vote(Category::Work, "a").await.unwrap();
    assert_eq!(receipt.results.pairs(), vec![("b", 4), ("a", 1)]);

    let err = handle.vote(Category::Work, "zzz").await.unwrap_err();
    assert!(matches!(err, Error::InvalidSession(_)));

    drop(handle);
    let widget = task.await.unwrap();
    assert_eq!(
        widget.store().current_selection(Category::Work).map(|s| s.as_str()),
        Some("a")
    );
    assert_eq!(
        view.shown_markers(),
        BTreeSet::from([(Category::Work, "a".to_string())])
    );
}

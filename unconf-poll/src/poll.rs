//! Poll widget and its event loop
//!
//! `PollWidget` ties the store, sync adapter and view together and handles
//! the two kinds of events the widget reacts to: a vote click and a remote
//! snapshot. `run_poll_loop` drives one widget from a single task, taking
//! one event at a time and handling it to completion, so no state is ever
//! shared between handlers.

use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use unconf_common::events::{EventBus, PollEvent};
use unconf_common::{Category, Error, Projection, Result, SessionId, Tally, UserSelection};

use crate::projector::project;
use crate::reconcile::{fold_aggregate, fold_selection};
use crate::store::{LocalVoteStore, VoteOutcome};
use crate::sync::{Inbound, RemoteSyncAdapter};
use crate::view::{VotedMarkers, WidgetView};

/// Command queue depth between HTTP handlers and the loop
const COMMAND_CAPACITY: usize = 64;

/// Response to a vote
#[derive(Debug, Clone, Serialize)]
pub struct VoteReceipt {
    pub category: Category,
    pub session: SessionId,
    pub changed: bool,
    pub previous: Option<SessionId>,
    pub results: Projection,
}

/// Point-in-time view of the widget state
#[derive(Debug, Clone, Serialize)]
pub struct PollSnapshot {
    /// `None` when running without a shared store
    pub client_id: Option<String>,
    pub remote: bool,
    pub selection: UserSelection,
    pub tally: Tally,
    pub results: BTreeMap<Category, Projection>,
}

pub struct PollWidget<V: WidgetView> {
    store: LocalVoteStore,
    sync: RemoteSyncAdapter,
    view: V,
    markers: VotedMarkers,
    bus: EventBus,
}

impl<V: WidgetView> PollWidget<V> {
    pub fn new(store: LocalVoteStore, sync: RemoteSyncAdapter, view: V, bus: EventBus) -> Self {
        Self {
            store,
            sync,
            view,
            markers: VotedMarkers::default(),
            bus,
        }
    }

    /// Show the restored selection's markers and render every category
    pub fn restore(&mut self) {
        let restored = VotedMarkers::from_selection(self.store.selection());
        for toggle in self.markers.diff(&restored) {
            self.view
                .set_voted_marker(&toggle.session, toggle.category, toggle.voted);
        }
        self.markers = restored;
        self.render_all();
    }

    /// Handle a click on `session`'s `category` button
    pub async fn vote(&mut self, category: Category, session: &str) -> Result<VoteReceipt> {
        let outcome = self.store.apply_vote(category, session)?;

        let (session, previous) = match outcome {
            VoteOutcome::Unchanged => {
                let session = self.store.catalog().resolve(session)?.clone();
                debug!("Repeat vote for '{}' in '{}' ignored", session, category);
                self.bus.emit_lossy(PollEvent::VoteUnchanged {
                    category,
                    session: session.clone(),
                    timestamp: chrono::Utc::now(),
                });
                return Ok(VoteReceipt {
                    category,
                    session,
                    changed: false,
                    previous: None,
                    results: self.projection(category),
                });
            }
            VoteOutcome::Changed { previous, current } => (current, previous),
        };

        info!(
            "Vote in '{}': {} -> {}",
            category,
            previous.as_ref().map(SessionId::as_str).unwrap_or("none"),
            session
        );

        if let Some(prev) = &previous {
            self.view.set_voted_marker(prev, category, false);
        }
        self.view.set_voted_marker(&session, category, true);
        self.markers = VotedMarkers::from_selection(self.store.selection());

        self.sync.push(&self.store).await;

        self.bus.emit_lossy(PollEvent::VoteApplied {
            category,
            session: session.clone(),
            previous: previous.clone(),
            timestamp: chrono::Utc::now(),
        });
        self.render_all();

        Ok(VoteReceipt {
            category,
            session,
            changed: true,
            previous,
            results: self.projection(category),
        })
    }

    /// Fold one remote snapshot into local state
    ///
    /// Malformed snapshots are logged and dropped; state is unchanged.
    pub fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Aggregate(value) => match fold_aggregate(&mut self.store, &value) {
                Ok(categories) => {
                    for category in &categories {
                        let results = self.projection(*category);
                        self.view.render_results(*category, &results);
                    }
                    self.bus.emit_lossy(PollEvent::TallyReconciled {
                        categories,
                        timestamp: chrono::Utc::now(),
                    });
                }
                Err(e) => warn!("Dropping malformed aggregate snapshot: {}", e),
            },
            Inbound::Selection(value) => {
                let was_null = value.is_null();
                match fold_selection(&mut self.store, &mut self.markers, &value) {
                    Ok(toggles) => {
                        for toggle in toggles {
                            self.view
                                .set_voted_marker(&toggle.session, toggle.category, toggle.voted);
                        }
                        if !was_null {
                            self.bus.emit_lossy(PollEvent::SelectionReconciled {
                                selection: self.store.selection().clone(),
                                timestamp: chrono::Utc::now(),
                            });
                        }
                    }
                    Err(e) => warn!("Dropping malformed selection snapshot: {}", e),
                }
            }
        }
    }

    /// Current projection for one category
    pub fn projection(&self, category: Category) -> Projection {
        project(self.store.catalog(), self.store.tally(category))
    }

    pub fn snapshot(&self) -> PollSnapshot {
        PollSnapshot {
            client_id: self.sync.identity().map(ToString::to_string),
            remote: self.sync.is_remote(),
            selection: self.store.selection().clone(),
            tally: self.store.full_tally().clone(),
            results: Category::ALL
                .iter()
                .map(|c| (*c, self.projection(*c)))
                .collect(),
        }
    }

    pub fn store(&self) -> &LocalVoteStore {
        &self.store
    }

    pub fn markers(&self) -> &VotedMarkers {
        &self.markers
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn sync(&self) -> &RemoteSyncAdapter {
        &self.sync
    }

    fn render_all(&mut self) {
        for category in Category::ALL {
            let results = self.projection(category);
            self.view.render_results(category, &results);
        }
    }
}

/// Requests handled by the poll loop
pub enum PollCommand {
    Vote {
        category: Category,
        session: String,
        reply: oneshot::Sender<Result<VoteReceipt>>,
    },
    Snapshot {
        reply: oneshot::Sender<PollSnapshot>,
    },
}

/// Cloneable sender side of the poll loop
#[derive(Clone)]
pub struct PollHandle {
    tx: mpsc::Sender<PollCommand>,
}

impl PollHandle {
    pub async fn vote(&self, category: Category, session: impl Into<String>) -> Result<VoteReceipt> {
        let (reply, rx) = oneshot::channel();
        self.send(PollCommand::Vote {
            category,
            session: session.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| loop_stopped())?
    }

    pub async fn snapshot(&self) -> Result<PollSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(PollCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| loop_stopped())
    }

    async fn send(&self, command: PollCommand) -> Result<()> {
        self.tx.send(command).await.map_err(|_| loop_stopped())
    }
}

fn loop_stopped() -> Error {
    Error::Internal("poll loop stopped".to_string())
}

/// Spawn the event loop owning `widget`
///
/// The loop ends when every `PollHandle` is dropped. Inbound snapshots are
/// optional: a closed or never-fed inbound channel just leaves the loop
/// serving commands.
pub fn spawn_poll_loop<V>(
    widget: PollWidget<V>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
) -> (PollHandle, JoinHandle<PollWidget<V>>)
where
    V: WidgetView + 'static,
{
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    let task = tokio::spawn(run_poll_loop(widget, rx, inbound));
    (PollHandle { tx }, task)
}

async fn run_poll_loop<V: WidgetView>(
    mut widget: PollWidget<V>,
    mut commands: mpsc::Receiver<PollCommand>,
    mut inbound: mpsc::UnboundedReceiver<Inbound>,
) -> PollWidget<V> {
    let mut inbound_open = true;

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    debug!("All poll handles dropped; stopping poll loop");
                    break;
                };
                match command {
                    PollCommand::Vote { category, session, reply } => {
                        let result = widget.vote(category, &session).await;
                        let _ = reply.send(result);
                    }
                    PollCommand::Snapshot { reply } => {
                        let _ = reply.send(widget.snapshot());
                    }
                }
            }
            snapshot = inbound.recv(), if inbound_open => {
                match snapshot {
                    Some(snapshot) => widget.handle_inbound(snapshot),
                    None => {
                        debug!("Inbound snapshot channel closed");
                        inbound_open = false;
                    }
                }
            }
        }
    }

    widget
}

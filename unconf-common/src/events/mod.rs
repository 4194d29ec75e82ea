//! Event types for the poll event system
//!
//! Provides the shared event definitions and the EventBus used to fan
//! poll state changes out to SSE clients and other observers.

use crate::catalog::{Category, SessionId};
use crate::votes::{Projection, UserSelection};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Poll event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PollEvent {
    /// A local vote changed the selection and tally
    ///
    /// Triggers:
    /// - Remote sync: push tally and selection
    /// - SSE: update vote buttons
    VoteApplied {
        category: Category,
        session: SessionId,
        /// Selection this vote replaced, if any
        previous: Option<SessionId>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A vote repeated the current selection and changed nothing
    VoteUnchanged {
        category: Category,
        session: SessionId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An aggregate snapshot replaced local tallies
    TallyReconciled {
        /// Categories that were overwritten by the snapshot
        categories: Vec<Category>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// This client's own selection record was restored from the remote store
    SelectionReconciled {
        selection: UserSelection,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A results container was re-rendered
    ResultsUpdated {
        category: Category,
        container_id: String,
        results: Projection,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A vote button's "voted" marker was toggled
    VotedMarkerChanged {
        session: SessionId,
        category: Category,
        voted: bool,
    },

    /// Remote store availability changed
    RemoteStatus {
        connected: bool,
        detail: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PollEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            PollEvent::VoteApplied { .. } => "VoteApplied",
            PollEvent::VoteUnchanged { .. } => "VoteUnchanged",
            PollEvent::TallyReconciled { .. } => "TallyReconciled",
            PollEvent::SelectionReconciled { .. } => "SelectionReconciled",
            PollEvent::ResultsUpdated { .. } => "ResultsUpdated",
            PollEvent::VotedMarkerChanged { .. } => "VotedMarkerChanged",
            PollEvent::RemoteStatus { .. } => "RemoteStatus",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for poll events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use unconf_common::events::{EventBus, PollEvent};
/// use unconf_common::Category;
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(PollEvent::VotedMarkerChanged {
///     session: "vibe-coding".into(),
///     category: Category::Scary,
///     voted: true,
/// });
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "VotedMarkerChanged");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PollEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before the oldest are
    /// dropped for lagging subscribers.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PollEvent,
    ) -> Result<usize, broadcast::error::SendError<PollEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PollEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

//! Widget view seam
//!
//! The markup layer is an external collaborator. The poll only ever asks
//! it to toggle a vote button's "voted" marker and to replace a results
//! container's content. `BusView` implements that by publishing events for
//! SSE clients, which own the actual rendering.

use std::collections::BTreeSet;
use unconf_common::events::{EventBus, PollEvent};
use unconf_common::{Category, Projection, SessionId, UserSelection};

/// Rendering operations the poll drives
pub trait WidgetView: Send {
    /// Show or hide the "voted" marker on `session`'s `category` button
    fn set_voted_marker(&mut self, session: &SessionId, category: Category, voted: bool);

    /// Replace the content of `category`'s results container
    fn render_results(&mut self, category: Category, results: &Projection);
}

/// Set of vote buttons currently showing the "voted" marker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VotedMarkers(BTreeSet<(Category, SessionId)>);

/// A single marker change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerToggle {
    pub session: SessionId,
    pub category: Category,
    pub voted: bool,
}

impl VotedMarkers {
    /// Markers implied by a selection: one per voted category
    pub fn from_selection(selection: &UserSelection) -> Self {
        Self(
            selection
                .voted()
                .map(|(category, session)| (category, session.clone()))
                .collect(),
        )
    }

    pub fn contains(&self, session: &str, category: Category) -> bool {
        self.0
            .iter()
            .any(|(c, s)| *c == category && s.as_str() == session)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &SessionId)> + '_ {
        self.0.iter().map(|(c, s)| (*c, s))
    }

    /// Toggles turning `self` into `next`, removals first
    pub fn diff(&self, next: &VotedMarkers) -> Vec<MarkerToggle> {
        let removed = self.0.difference(&next.0).map(|(c, s)| MarkerToggle {
            session: s.clone(),
            category: *c,
            voted: false,
        });
        let added = next.0.difference(&self.0).map(|(c, s)| MarkerToggle {
            session: s.clone(),
            category: *c,
            voted: true,
        });
        removed.chain(added).collect()
    }
}

/// View that publishes render operations on the EventBus
pub struct BusView {
    bus: EventBus,
}

impl BusView {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

impl WidgetView for BusView {
    fn set_voted_marker(&mut self, session: &SessionId, category: Category, voted: bool) {
        self.bus.emit_lossy(PollEvent::VotedMarkerChanged {
            session: session.clone(),
            category,
            voted,
        });
    }

    fn render_results(&mut self, category: Category, results: &Projection) {
        self.bus.emit_lossy(PollEvent::ResultsUpdated {
            category,
            container_id: category.results_container_id(),
            results: results.clone(),
            timestamp: chrono::Utc::now(),
        });
    }
}

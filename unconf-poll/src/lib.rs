//! unconf-poll library - live session poll widget
//!
//! Attendees cast one vote per category for conference sessions. Votes are
//! kept on this device and, when a shared realtime store is configured,
//! mirrored to it so every client converges on the same tallies.

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use unconf_common::events::EventBus;
use unconf_common::Catalog;

pub mod api;
pub mod poll;
pub mod projector;
pub mod reconcile;
pub mod remote;
pub mod snapshot;
pub mod store;
pub mod sync;
pub mod view;

pub use poll::{spawn_poll_loop, PollHandle, PollWidget};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Sender side of the poll event loop
    pub poll: PollHandle,
    /// Bus carrying render and vote events to SSE clients
    pub bus: EventBus,
    /// Votable sessions
    pub catalog: Arc<Catalog>,
}

impl AppState {
    pub fn new(poll: PollHandle, bus: EventBus, catalog: Arc<Catalog>) -> Self {
        Self { poll, bus, catalog }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/api/buildinfo", get(api::get_build_info))
        .route("/api/catalog", get(api::get_catalog))
        .route("/api/vote", post(api::cast_vote))
        .route("/api/selection", get(api::get_selection))
        .route("/api/results", get(api::get_all_results))
        .route("/api/results/:category", get(api::get_category_results))
        .route("/events", get(api::event_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Vote, selection and results endpoints
//!
//! These stand in for the markup layer: a vote button click becomes
//! `POST /api/vote`, and result containers read `/api/results`.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use unconf_common::catalog::SessionEntry;
use unconf_common::{Category, Projection, ResultRow, SessionId, UserSelection};

use super::ApiError;
use crate::poll::VoteReceipt;
use crate::AppState;

/// Body of `POST /api/vote`
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub category: String,
    pub session: String,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub categories: Vec<Category>,
    pub sessions: Vec<SessionEntry>,
}

/// A results container's content
#[derive(Debug, Serialize)]
pub struct ResultsView {
    pub category: Category,
    pub container_id: String,
    /// Placeholder text when nobody has voted
    pub empty_text: Option<&'static str>,
    pub rows: Vec<ResultLine>,
}

#[derive(Debug, Serialize)]
pub struct ResultLine {
    pub session: SessionId,
    pub name: String,
    pub count: u64,
    pub label: String,
}

impl ResultsView {
    fn new(category: Category, projection: &Projection) -> Self {
        Self {
            category,
            container_id: category.results_container_id(),
            empty_text: projection.is_placeholder().then_some(Projection::NO_VOTES_TEXT),
            rows: projection.rows().iter().map(ResultLine::from).collect(),
        }
    }
}

impl From<&ResultRow> for ResultLine {
    fn from(row: &ResultRow) -> Self {
        Self {
            session: row.session.clone(),
            name: row.name.clone(),
            count: row.count,
            label: row.votes_label(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SelectionResponse {
    pub client_id: Option<String>,
    pub remote: bool,
    pub selection: UserSelection,
    /// Buttons showing the "voted" marker, as `(session, category)`
    pub voted: Vec<VotedButton>,
}

#[derive(Debug, Serialize)]
pub struct VotedButton {
    pub session: SessionId,
    pub category: Category,
}

/// GET /api/catalog
pub async fn get_catalog(State(state): State<AppState>) -> Json<CatalogResponse> {
    Json(CatalogResponse {
        categories: Category::ALL.to_vec(),
        sessions: state.catalog.entries().to_vec(),
    })
}

/// POST /api/vote
pub async fn cast_vote(
    State(state): State<AppState>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<VoteReceipt>, ApiError> {
    let category: Category = request.category.parse()?;
    let receipt = state.poll.vote(category, request.session).await?;
    Ok(Json(receipt))
}

/// GET /api/selection
pub async fn get_selection(
    State(state): State<AppState>,
) -> Result<Json<SelectionResponse>, ApiError> {
    let snapshot = state.poll.snapshot().await?;
    let voted = snapshot
        .selection
        .voted()
        .map(|(category, session)| VotedButton {
            session: session.clone(),
            category,
        })
        .collect();

    Ok(Json(SelectionResponse {
        client_id: snapshot.client_id,
        remote: snapshot.remote,
        selection: snapshot.selection,
        voted,
    }))
}

/// GET /api/results
pub async fn get_all_results(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<Category, ResultsView>>, ApiError> {
    let snapshot = state.poll.snapshot().await?;
    Ok(Json(
        snapshot
            .results
            .iter()
            .map(|(category, projection)| (*category, ResultsView::new(*category, projection)))
            .collect(),
    ))
}

/// GET /api/results/:category
pub async fn get_category_results(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<ResultsView>, ApiError> {
    let category: Category = category.parse()?;
    let snapshot = state.poll.snapshot().await?;
    let projection = snapshot
        .results
        .get(&category)
        .cloned()
        .unwrap_or(Projection::NoVotesYet);
    Ok(Json(ResultsView::new(category, &projection)))
}

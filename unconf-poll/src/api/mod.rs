//! HTTP API handlers for unconf-poll

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use unconf_common::Error;

pub mod buildinfo;
pub mod health;
pub mod sse;
pub mod votes;

pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use sse::event_stream;
pub use votes::{cast_vote, get_all_results, get_catalog, get_category_results, get_selection};

/// Error response wrapper mapping poll errors to HTTP status codes
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidSession(_) | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::UnknownCategory(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

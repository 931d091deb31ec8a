//! Local HTTP API for the tablet UI

mod audit;
mod health;
mod sse;

pub use audit::{
    bulk_update, export_csv, get_audit, get_stats, get_technicians, parse_measures, push_summary,
    set_connectivity, update_module, validate_import,
};
pub use health::health_routes;
pub use sse::events_stream;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// API error mapped onto HTTP status codes
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// Hub-side failure while this device believes it is online
    Upstream(String),
    Internal(String),
}

impl From<elaudit_common::Error> for ApiError {
    fn from(e: elaudit_common::Error) -> Self {
        match e {
            elaudit_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            elaudit_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            elaudit_common::Error::Network(msg) => ApiError::Upstream(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

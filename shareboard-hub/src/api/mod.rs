use axum::{
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use shareboard_core::gateway::GatewayError;

mod board;
mod events;

use crate::state::AppState;

/// Axum REST API routes.
///
///   GET    /status              -> health check
///   POST   /boards              -> insert a board row (409 if the id exists)
///   GET    /boards/:boardId     -> board row (404 if absent)
///   PUT    /boards/:boardId     -> insert or overwrite the whole row
///   DELETE /boards/:boardId     -> delete the row (no-op if absent)
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/status", get(events::status))
        .route("/boards", axum::routing::post(board::insert_board))
        .route(
            "/boards/{board_id}",
            get(board::get_board)
                .put(board::upsert_board)
                .delete(board::delete_board),
        )
}

// ── Shared types and helpers used across sub-modules ────────────────────

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    let message = message.into();
    log_api_issue(status, "shareboard.hub.api", &message);
    (status, Json(ErrorResponse { error: message }))
}

fn gateway_error(e: GatewayError) -> ApiError {
    let status = match &e {
        GatewayError::AlreadyExists(_) => StatusCode::CONFLICT,
        GatewayError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        GatewayError::Decode(_) => StatusCode::BAD_REQUEST,
        GatewayError::Unavailable(_) | GatewayError::Transport(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    api_error(status, e.to_string())
}

/// Board ids are routable share tokens; keep them to a safe character set.
pub(crate) fn is_valid_board_id(board_id: &str) -> bool {
    !board_id.is_empty()
        && board_id.len() <= 64
        && board_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub(crate) fn check_board_id(board_id: &str) -> Result<(), ApiError> {
    if is_valid_board_id(board_id) {
        Ok(())
    } else {
        Err(api_error(StatusCode::BAD_REQUEST, "Invalid board id"))
    }
}

fn log_api_issue(status: StatusCode, target: &'static str, message: impl AsRef<str>) {
    let message = message.as_ref();
    if status.is_server_error() {
        log::error!(target: target, "{}", message);
    } else {
        log::warn!(target: target, "{}", message);
    }
}

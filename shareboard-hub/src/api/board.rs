use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use shareboard_core::gateway::{BoardDocument, RemoteBoardGateway};

use super::{api_error, check_board_id, gateway_error, ApiError};
use crate::state::AppState;

pub async fn get_board(
    State(state): State<AppState>,
    Path(board_id): Path<String>,
) -> Result<Json<BoardDocument>, ApiError> {
    check_board_id(&board_id)?;
    match state.gateway.fetch(&board_id).await.map_err(gateway_error)? {
        Some(doc) => Ok(Json(doc)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(super::ErrorResponse {
                error: "Board not found".to_string(),
            }),
        )),
    }
}

pub async fn insert_board(
    State(state): State<AppState>,
    Json(doc): Json<BoardDocument>,
) -> Result<StatusCode, ApiError> {
    check_board_id(&doc.id)?;
    state.gateway.insert(&doc).await.map_err(gateway_error)?;
    state.persist();
    log::info!(target: "shareboard.hub.api", "Created board {}", doc.id);
    Ok(StatusCode::CREATED)
}

pub async fn upsert_board(
    State(state): State<AppState>,
    Path(board_id): Path<String>,
    Json(doc): Json<BoardDocument>,
) -> Result<StatusCode, ApiError> {
    check_board_id(&board_id)?;
    if doc.id != board_id {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Document id {} does not match path {}", doc.id, board_id),
        ));
    }
    state.gateway.upsert(&doc).await.map_err(gateway_error)?;
    state.persist();
    log::debug!(target: "shareboard.hub.api", "Saved board {}", board_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_board(
    State(state): State<AppState>,
    Path(board_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    check_board_id(&board_id)?;
    state.gateway.delete(&board_id).await.map_err(gateway_error)?;
    state.persist();
    log::info!(target: "shareboard.hub.api", "Deleted board {}", board_id);
    Ok(StatusCode::NO_CONTENT)
}

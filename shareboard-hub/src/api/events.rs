use axum::{extract::State, response::Json};

use crate::state::AppState;

pub async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "running",
        "port": state.port,
        "bind_address": state.bind_address,
        "boards": state.gateway.documents().len(),
        "persistent": state.snapshots.is_some(),
    }))
}

use crate::api::api_router;
use crate::feed::feed_router;
use crate::state::AppState;
/// HTTP server: spawns axum on a background tokio task.
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to restore board snapshot: {0}")]
    Restore(#[from] shareboard_core::storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    api_router()
        .merge(feed_router())
        .layer(cors)
        .with_state(state)
}

/// Bind and serve in the background. Returns the port actually bound
/// (useful when the configured port is 0).
pub async fn spawn_server(state: AppState) -> Result<u16, HubError> {
    let addr = format!("{}:{}", state.bind_address, state.port);
    let bind_addr = state.bind_address.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| HubError::Bind {
            addr: addr.clone(),
            source,
        })?;
    let actual_port = listener.local_addr()?.port();

    log::info!(
        target: "shareboard.hub.server",
        "HTTP server listening on http://{}:{}",
        bind_addr,
        actual_port
    );

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::error!(target: "shareboard.hub.server", "HTTP server exited with error: {}", e);
        }
    });

    Ok(actual_port)
}

/// Shareboard hub: a self-hosted board document store (REST rows plus a
/// WebSocket change feed per board) and the client that talks to it.
pub mod api;
pub mod client;
pub mod config;
pub mod feed;
pub mod server;
pub mod state;

use std::sync::Arc;

use shareboard_core::storage::local::FileStore;

use crate::config::HubConfig;
use crate::server::HubError;
use crate::state::AppState;

/// Build the state described by `config`, restoring the snapshot unless ephemeral.
pub fn build_state(config: &HubConfig) -> Result<AppState, HubError> {
    if config.ephemeral {
        log::info!(target: "shareboard.hub", "Running without persistence");
        return Ok(AppState::in_memory(config.bind_address.clone(), config.port));
    }
    let dir = config.resolved_data_dir();
    log::info!(target: "shareboard.hub", "Board snapshots in {}", dir.display());
    let state = AppState::restore(
        Arc::new(FileStore::new(dir)),
        config.bind_address.clone(),
        config.port,
    )?;
    Ok(state)
}

/// Start the hub and serve until Ctrl-C.
pub async fn run(config: HubConfig) -> Result<(), HubError> {
    let state = build_state(&config)?;
    let port = server::spawn_server(state.clone()).await?;
    log::info!(
        target: "shareboard.hub",
        "Shareboard hub ready on {}:{}",
        config.bind_address,
        port
    );

    tokio::signal::ctrl_c().await?;
    log::info!(target: "shareboard.hub", "Shutting down");
    state.persist();
    Ok(())
}

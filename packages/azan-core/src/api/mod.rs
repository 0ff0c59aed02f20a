//! HTTP API layer.
//!
//! This module contains the thin handlers serving the status bar widget, the
//! router construction and server startup.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;

use crate::clock::Clock;
use crate::state::{Config, SharedState};

pub mod http;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),
}

/// Shared application state for the API layer.
///
/// Handlers only read the scheduler state or flip the mute flag; every access
/// goes through the same lock the scheduler uses.
#[derive(Clone)]
pub struct AppState {
    /// Time-table, fired set, mute flag and playback, shared with the scheduler.
    pub state: SharedState,
    /// Wall-clock source for status snapshots.
    pub clock: Arc<dyn Clock>,
    /// Application configuration.
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(state: SharedState, clock: Arc<dyn Clock>, config: Arc<Config>) -> Self {
        Self {
            state,
            clock,
            config,
        }
    }
}

/// Starts the HTTP server on the configured localhost port.
///
/// Runs until the listener fails; the daemon drops the task on shutdown.
pub async fn start_server(state: AppState) -> Result<(), ServerError> {
    let addr = SocketAddr::from(([127, 0, 0, 1], state.config.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("[Server] Listening on http://{}", addr);
    let app = http::create_router(state);

    axum::serve(listener, app).await?;
    Ok(())
}

pub mod collaborators;
pub mod config;
pub mod connection;
pub mod error;
pub mod hub;
pub mod http;
pub mod participant;
pub mod session;
pub mod token;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::get,
    Router,
};

use collaborators::{MediaLibrary, SessionStore};
use hub::Hub;
use token::TokenMinter;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub minter: TokenMinter,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SessionStore>,
        library: Arc<dyn MediaLibrary>,
        minter: TokenMinter,
        grace_period: Duration,
    ) -> Self {
        let hub = Hub::new(store, library, minter.clone(), grace_period);
        Self { hub, minter }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/lt/:session_id/ws", get(ws::ws_handler))
        .route("/lt/:session_id/search", get(http::search::search))
        .route("/lt/stream/:token", get(http::stream::stream_claims))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .with_state(state)
}

mod health {
    use axum::response::IntoResponse;
    pub async fn healthz() -> impl IntoResponse {
        "ok"
    }
    pub async fn readyz() -> impl IntoResponse {
        "ok"
    }
}

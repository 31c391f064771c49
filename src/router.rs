use crate::handlers::vault;
use crate::service::VaultService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct HavenState {
    pub vault: Arc<VaultService>,
}

impl HavenState {
    pub fn new(vault: Arc<VaultService>) -> Self {
        Self { vault }
    }
}

pub fn haven_router(state: HavenState, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(vault::ping))
        .route("/auth", post(vault::auth))
        .route("/save", post(vault::save))
        .route("/load", post(vault::load))
        .route("/loadlevel", post(vault::load_level))
        .route("/delete", post(vault::delete))
        .route("/check", post(vault::check))
        .route("/lastsaved", post(vault::last_saved))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

//! Health surface. The business routes (activity sync, weather enrichment,
//! OAuth) live behind this shell and are not part of the lifecycle work.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Health payload shared with deploy tooling.
#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub storage: &'static str,
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn health(State(state): State<AppState>) -> Json<Health> {
    let storage = if state.db.is_closed() { "closed" } else { "open" };
    Json(Health {
        status: "ok",
        storage,
    })
}

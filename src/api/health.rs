//! Liveness view over the store and the sync collaborator.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::store::local::CollectionCounts;
use crate::sync::SyncPhase;

use super::routes::ApiState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub sync_phase: SyncPhase,
    pub collections: CollectionCounts,
}

pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started.elapsed().as_secs(),
        sync_phase: state.sync.current(),
        collections: state.store.counts(),
    })
}

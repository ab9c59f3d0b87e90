//! Query endpoints: one live sample per request, no caching.

use axum::{extract::State, Json};

use crate::metrics::{collect_cores, collect_cpu, collect_memory, collect_stats};
use crate::state::AppState;
use crate::types::{CoreStats, CpuStats, MemoryStats, SystemStats};

pub async fn get_cpu(State(state): State<AppState>) -> Json<CpuStats> {
    Json(collect_cpu(&state.sys).await)
}

pub async fn get_memory(State(state): State<AppState>) -> Json<MemoryStats> {
    Json(collect_memory(&state.sys).await)
}

pub async fn get_cores(State(state): State<AppState>) -> Json<Vec<CoreStats>> {
    Json(collect_cores(&state.sys).await)
}

pub async fn get_stats(State(state): State<AppState>) -> Json<SystemStats> {
    Json(collect_stats(&state.sys).await)
}

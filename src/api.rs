// src/api.rs
//! Read-only debug/status surface. Nothing here touches the cursor or the
//! processing pipeline.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shuttle_axum::axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::cursor::{Cursor, CursorStore};
use crate::feed::{self, Item, SnapshotFetcher};
use crate::scheduler::{PollScheduler, SchedulerState};
use crate::watcher::{CycleReport, StatusHandle};

const DEFAULT_LATEST: usize = 20;
const MAX_LATEST: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<dyn SnapshotFetcher>,
    pub cursor_store: Arc<dyn CursorStore>,
    pub status: StatusHandle,
    pub scheduler: Option<Arc<PollScheduler>>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/latest", get(latest))
        .route("/status", get(status))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct LatestQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct LatestOut {
    latest: Vec<Item>,
}

#[derive(Serialize)]
struct ErrorOut {
    error: String,
}

async fn latest(State(state): State<AppState>, Query(q): Query<LatestQuery>) -> Response {
    let limit = q.limit.unwrap_or(DEFAULT_LATEST).clamp(1, MAX_LATEST);
    match feed::latest(state.fetcher.as_ref(), limit).await {
        Ok(latest) => Json(LatestOut { latest }).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorOut {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

#[derive(Serialize)]
struct StatusOut {
    scheduler: Option<SchedulerState>,
    cursor: Option<Cursor>,
    cursor_error: Option<String>,
    last_cycle: Option<CycleReport>,
}

async fn status(State(state): State<AppState>) -> Json<StatusOut> {
    let (cursor, cursor_error) = match state.cursor_store.read().await {
        Ok(c) => (c, None),
        Err(e) => (None, Some(e.to_string())),
    };
    let last_cycle = state.status.read().ok().and_then(|g| g.clone());
    Json(StatusOut {
        scheduler: state.scheduler.as_ref().map(|s| s.state()),
        cursor,
        cursor_error,
        last_cycle,
    })
}

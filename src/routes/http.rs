// GET handlers: root, version, total, ledger

use axum::{Json, extract::State, response::IntoResponse};

use super::AppState;
use crate::models::{LedgerView, TotalTrafficReport};
use crate::sysinfo_repo::sample_counters;
use crate::version::{NAME, VERSION, banner};

/// GET /: liveness text.
pub(super) async fn root_handler() -> String {
    format!("{} is running", banner())
}

/// GET /version: service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /total: aggregate since the last reset plus a fresh counter sample.
/// A failed sample reports the `-1` sentinel instead of failing the request.
pub(super) async fn total_handler(State(state): State<AppState>) -> Json<TotalTrafficReport> {
    let aggregate = state.ledger.read().await.aggregate();
    let current = match sample_counters(state.counter_source.clone(), state.interface.clone()).await
    {
        Ok(c) => Some(c),
        Err(e) => {
            tracing::warn!(error = %e, operation = "get_total", "current traffic sample failed");
            None
        }
    };
    Json(TotalTrafficReport::new(aggregate, current))
}

/// GET /api/ledger: live sessions, baseline and derived totals.
pub(super) async fn ledger_handler(State(state): State<AppState>) -> Json<LedgerView> {
    Json(state.ledger.read().await.view())
}

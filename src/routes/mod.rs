// HTTP routes. Read-only: handlers never mutate the ledger.

mod http;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::ledger::SharedLedger;
use crate::sysinfo_repo::CounterSource;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) ledger: SharedLedger,
    pub(crate) counter_source: Arc<dyn CounterSource>,
    pub(crate) interface: Option<String>,
}

pub fn app(
    ledger: SharedLedger,
    counter_source: Arc<dyn CounterSource>,
    interface: Option<String>,
) -> Router {
    let state = AppState {
        ledger,
        counter_source,
        interface,
    };
    Router::new()
        .route("/", get(http::root_handler)) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/total", get(http::total_handler)) // GET /total
        .route("/api/ledger", get(http::ledger_handler)) // GET /api/ledger
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

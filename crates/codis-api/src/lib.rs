//! codis-api: HTTP surface of the Codis exporter.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | Landing page linking to the metrics path |
//! | GET | `<metrics_path>` | Runs one collection pass, Prometheus exposition |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use codis_metrics::CodisCollector;

/// Shared state for handlers.
#[derive(Clone)]
pub struct ApiState {
    pub collector: Arc<CodisCollector>,
    pub metrics_path: String,
}

/// Build the exporter router.
pub fn build_router(collector: Arc<CodisCollector>, metrics_path: &str) -> Router {
    let state = ApiState {
        collector,
        metrics_path: metrics_path.to_string(),
    };

    Router::new()
        .route("/", get(handlers::landing_page))
        .route(metrics_path, get(handlers::prometheus_metrics))
        .with_state(state)
}

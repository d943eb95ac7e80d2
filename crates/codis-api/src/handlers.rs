//! Request handlers.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse};
use tracing::debug;

use codis_metrics::prometheus::CONTENT_TYPE;

use crate::ApiState;

/// GET /
pub async fn landing_page(State(state): State<ApiState>) -> impl IntoResponse {
    Html(format!(
        "<html>\n\
         <head><title>Codis Exporter</title></head>\n\
         <body>\n\
         <h1>Codis Exporter</h1>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n\
         </body>\n\
         </html>\n",
        path = state.metrics_path
    ))
}

/// GET /metrics. One full collection pass per request.
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let exposition = state.collector.collect().await;
    let body = exposition.render();
    debug!(bytes = body.len(), "served metrics");
    (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body)
}

//! Prometheus metrics endpoint

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, TextEncoder};

use crate::metrics::REGISTRY;

/// GET /metrics
///
/// Returns all registered metrics in Prometheus text format. Mounted
/// behind the auth gate by the top-level router.
pub async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&REGISTRY.gather()) {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            text,
        )
            .into_response(),
        Err(error) => {
            tracing::error!(%error, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

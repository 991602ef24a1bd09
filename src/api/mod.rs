//! API layer
//!
//! HTTP handlers for the protected part of the application:
//! - Catch-all greeting page
//! - Metrics (Prometheus)

mod home;
mod metrics;

use axum::{Router, middleware, routing::get};

use crate::auth::require_login;

pub use home::greet;
pub use metrics::metrics_handler;

/// Create the protected router
///
/// Every route here, including the fallback, sits behind
/// [`require_login`]. Requests for unknown paths land on the greeting.
/// None of the handlers read [`AppState`](crate::AppState), so the router is
/// stateless and can be mounted as a fallback service.
pub fn protected_router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .fallback(get(greet))
        .layer(middleware::from_fn(require_login))
}

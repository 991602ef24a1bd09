//! Authentication middleware
//!
//! Protects every route that is not part of the sign-in flow itself.

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tower_sessions::Session;

use super::found;
use super::session::{self, AuthSession};
use crate::error::AppError;
use crate::metrics::GATE_REDIRECTS_TOTAL;

/// Login URL that returns the user to `original_url` afterwards
pub fn login_redirect(original_url: &str) -> String {
    format!("/login?originalUrl={}", urlencoding::encode(original_url))
}

/// Middleware to require an authenticated session
///
/// Requests without one are redirected to `/login` with the requested
/// path and query attached as `originalUrl`. Authenticated requests get
/// the session record added to their extensions.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/metrics", get(metrics_handler))
///     .layer(middleware::from_fn(require_login));
/// ```
pub async fn require_login(session: Session, mut request: Request, next: Next) -> Response {
    match session::load(&session).await {
        Some(record) if record.authenticated => {
            request.extensions_mut().insert(record);
            next.run(request).await
        }
        _ => {
            let original_url = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/");

            GATE_REDIRECTS_TOTAL.inc();
            tracing::debug!(%original_url, "Unauthenticated request; redirecting to login");

            found(&login_redirect(original_url))
        }
    }
}

/// Extractor for the authenticated session
///
/// Only valid behind [`require_login`]. A missing record means the route
/// was mounted outside the gate, which is a wiring defect rather than a
/// user error.
///
/// # Usage
/// ```ignore
/// async fn handler(CurrentUser(session): CurrentUser) -> impl IntoResponse {
///     format!("Hello {}!", session.user)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthSession);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthSession>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!(
                    "no authenticated session on request; route is not behind require_login"
                ))
            })
    }
}

//! Delegated authentication
//!
//! Handles:
//! - Identity provider sign-in flow
//! - Session management
//! - Authentication middleware

mod middleware;
mod oauth;
pub mod session;
pub mod state;

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

pub use middleware::{CurrentUser, login_redirect, require_login};
pub use oauth::{LOGIN_SCOPES, auth_router};
pub use session::{AuthSession, SESSION_COOKIE_NAME, cookie_key};
pub use state::LoginState;

/// 302 Found to `location`
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

//! Sign-in flow
//!
//! Implements the OAuth 2.0 authorization code flow with the identity
//! provider, using the `form_post` response mode.

use axum::{
    Form, Router,
    extract::{Query, State},
    response::Response,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;

use super::found;
use super::session::{self, AuthSession};
use super::state::{LoginState, redirect_target_for};
use crate::AppState;
use crate::error::AppError;
use crate::identity::{
    AuthorizationCodeRequest, AuthorizationUrlRequest, CallbackPayload, ResponseMode,
};
use crate::metrics::{CALLBACKS_TOTAL, LOGINS_STARTED_TOTAL, LOGOUTS_TOTAL};

/// Scopes requested at login and again at code redemption
pub const LOGIN_SCOPES: [&str; 1] = ["user.read"];

/// Create authentication router
///
/// Routes:
/// - GET /login - Redirect to the identity provider
/// - POST /redirect - Provider callback (form post)
/// - GET /logout - Destroy the session
///
/// Other methods on these paths are handed to `gated`, the same router
/// that serves unmatched paths, so they pass the auth gate like any other
/// request.
pub fn auth_router(gated: Router) -> Router<AppState> {
    Router::new()
        .route("/login", get(login).fallback_service(gated.clone()))
        .route(
            "/redirect",
            post(redirect_callback).fallback_service(gated.clone()),
        )
        .route("/logout", get(logout).fallback_service(gated))
}

fn login_scopes() -> Vec<String> {
    LOGIN_SCOPES.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Login
// =============================================================================

#[derive(Debug, Deserialize)]
struct LoginQuery {
    #[serde(rename = "originalUrl")]
    original_url: Option<String>,
}

/// GET /login
///
/// Redirects the browser to the provider's authorization page with the
/// original URL tucked into `state`.
async fn login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> Result<Response, AppError> {
    let login_state = LoginState::new(query.original_url);

    let request = AuthorizationUrlRequest {
        response_mode: ResponseMode::FormPost,
        redirect_uri: state.config.auth.redirect_uri.clone(),
        scopes: login_scopes(),
        state: login_state.encode()?,
    };
    let authorization_url = state.identity.authorization_url(&request).await?;

    LOGINS_STARTED_TOTAL.inc();
    tracing::info!(
        original_url = ?login_state.original_url,
        "Redirecting to identity provider"
    );

    Ok(found(authorization_url.as_str()))
}

// =============================================================================
// Callback
// =============================================================================

/// POST /redirect
///
/// # Steps
/// 1. Redeem the authorization code with the provider
/// 2. Replace the session with the authenticated record
/// 3. Redirect to the original URL from `state`, or `/`
///
/// A failed redemption leaves the session untouched.
async fn redirect_callback(
    State(state): State<AppState>,
    session: Session,
    Form(payload): Form<CallbackPayload>,
) -> Result<Response, AppError> {
    // A provider error without a code is still handed to the provider
    // client, which turns it into an authentication failure.
    let code = match payload.code() {
        Some(code) => code.to_string(),
        None if payload.error().is_some() => String::new(),
        None => {
            return Err(AppError::Validation(
                "missing authorization code".to_string(),
            ));
        }
    };

    let request = AuthorizationCodeRequest {
        code,
        redirect_uri: state.config.auth.redirect_uri.clone(),
        scopes: login_scopes(),
    };

    let result = match state.identity.acquire_token_by_code(&request, &payload).await {
        Ok(result) => result,
        Err(error) => {
            CALLBACKS_TOTAL.with_label_values(&["failed"]).inc();
            return Err(error);
        }
    };

    let record = AuthSession::from(result);
    session::establish(&session, &record).await?;

    let target = redirect_target_for(payload.state());

    CALLBACKS_TOTAL.with_label_values(&["success"]).inc();
    tracing::info!(
        home_account_id = %record.account.home_account_id,
        %target,
        "Sign-in completed"
    );
    tracing::debug!(username = %record.user, "Signed-in account");

    Ok(found(&target))
}

// =============================================================================
// Logout
// =============================================================================

/// GET /logout
///
/// Destroys the local session only; provider-side tokens are not revoked.
async fn logout(session: Session) -> Result<Response, AppError> {
    session::destroy(&session).await?;

    LOGOUTS_TOTAL.inc();
    tracing::info!("Session destroyed");

    Ok(found("/"))
}

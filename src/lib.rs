//! signin-gate - A minimal web server gated behind delegated sign-in
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Layer (Axum)                       │
//! │  - /login, /redirect, /logout (public)                      │
//! │  - everything else behind the auth gate                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Session Layer (tower-sessions)             │
//! │  - signed `sid` cookie, in-memory store                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Identity Provider Client                    │
//! │  - authorization URL, code redemption (reqwest)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: Protected handlers (greeting, metrics)
//! - `auth`: Sign-in flow, sessions, auth gate
//! - `identity`: Identity provider client
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod identity;
pub mod metrics;

use std::sync::Arc;

use identity::IdentityProvider;

/// Application state shared across all handlers
///
/// Built once before the listener starts and immutable afterwards.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Identity provider client
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    /// Initialize application state with the Microsoft identity client
    ///
    /// # Errors
    /// Returns error if the HTTP client or identity client cannot be built
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("signin-gate/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;

        let identity = identity::MicrosoftIdentityClient::new(&config.auth, http_client)?;
        tracing::info!(
            authority = %config.auth.authority,
            redirect_uri = %config.auth.redirect_uri,
            "Identity client initialized"
        );

        Ok(Self::with_identity(config, Arc::new(identity)))
    }

    /// Assemble state around an existing identity provider
    pub fn with_identity(config: config::AppConfig, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            config: Arc::new(config),
            identity,
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;
    use tower_sessions::cookie::SameSite;
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_name(auth::SESSION_COOKIE_NAME)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_secure(state.config.auth.use_secure_cookies())
        .with_signed(auth::cookie_key(&state.config.auth.cookie_secret));

    // Anything the sign-in routes do not match, by path or by method,
    // continues into the gated router.
    let gated = api::protected_router();

    Router::new()
        .merge(auth::auth_router(gated.clone()))
        .fallback_service(gated)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

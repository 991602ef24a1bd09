//! signin-gate binary entry point

use signin_gate::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Initialize tracing/logging
/// 2. Load configuration from file and environment
/// 3. Initialize AppState
/// 4. Build Axum router
/// 5. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize tracing/logging
    let log_format =
        std::env::var("SIGNIN_GATE__LOGGING__FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "signin_gate=info,tower_http=debug".into());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting signin-gate...");

    // 2. Initialize metrics
    signin_gate::metrics::init_metrics();

    // 3. Load configuration
    let config = config::AppConfig::load()?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Configuration loaded"
    );

    // 4. Initialize application state
    let state = AppState::new(config.clone())?;

    // 5. Build Axum router
    let app = signin_gate::build_router(state);

    // 6. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server is running on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

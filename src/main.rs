use early_risk::config::Config;
use early_risk::handlers::{self, AppState};
use early_risk::obs;
use std::net::SocketAddr;
use std::sync::Arc;

/// Main entry point for the upload server.
///
/// Initializes tracing and configuration, builds the shared flag engine and
/// serves `/health` plus the rate-limited upload routes.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obs::init_tracing("early_risk=debug,tower_http=debug");

    let config = Config::from_env()?;

    let app_state = Arc::new(AppState::new(config.clone()));
    let app = handlers::app(app_state, true)?;

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

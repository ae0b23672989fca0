use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use lessonbook::config::AppConfig;
use lessonbook::db;
use lessonbook::handlers;
use lessonbook::services::auth;
use lessonbook::services::backend::http::HttpBackend;
use lessonbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let backend = HttpBackend::new(config.api_base_url.clone(), config.api_timeout())?;
    tracing::info!("using booking API at {}", config.api_base_url);

    let state = Arc::new(AppState::new(conn, config.clone(), Box::new(backend)));

    if let Some(user) = auth::restore(&state)? {
        tracing::info!(role = ?user.role, "landing route {}", auth::landing_route(&user.role));
    }

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

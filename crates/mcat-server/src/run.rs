use crate::config::ServerConfig;
use crate::error::Result;
use axum::http::StatusCode;
use axum::{response::IntoResponse, routing::get, Json, Router};
use futures::FutureExt;
use mcat_app::state::{AppConfig, AppState};
use serde_json::json;
use tracing::{debug, info};

pub async fn run(args: ServerConfig) -> Result<()> {
    let state = build_state(&args).await?;
    run_with_state(args, state).await
}

pub async fn run_with_state(args: ServerConfig, state: AppState) -> Result<()> {
    let shutdown = tokio::signal::ctrl_c().map(|_| ());
    run_graceful_with_state(args, state, shutdown).await
}

pub async fn run_graceful_with_state<S>(
    args: ServerConfig,
    state: AppState,
    shutdown_signal: S,
) -> Result<()>
where
    S: std::future::Future<Output = ()> + Send + 'static,
{
    let mut app = main_router(state);

    if args.cors {
        app = app.layer(tower_http::cors::CorsLayer::very_permissive());
    }

    let ip: std::net::IpAddr = args.listen_address.parse()?;
    let addr = std::net::SocketAddr::from((ip, args.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    debug!("Server stopped");
    Ok(())
}

pub fn main_router(state: AppState) -> Router<()> {
    Router::new()
        .nest("/api/movie", mcat_app::rest_api::movie::router())
        .with_state(state)
        .route("/health", get(health))
}

async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "available",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

/// Opens the database, waits for it to answer within the configured timeout
/// and makes sure the schema exists.
pub async fn build_state(config: &ServerConfig) -> Result<AppState> {
    let pool = mcat_dal::new_pool(&config.database_url).await?;
    mcat_dal::check_connection(&pool, config.connect_timeout).await?;
    mcat_dal::init_schema(&pool).await?;
    info!("Database {} is ready", config.database_url);

    let app_config: AppConfig = config.into();
    Ok(AppState::new(app_config, pool))
}

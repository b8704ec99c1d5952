use anyhow::{Context, Result};
use std::{net::SocketAddr, time::Duration};

use serde::Serialize;
use tower_http::services::ServeDir;
use tracing::{error, info};

use axum::{
    extract::{DefaultBodyLimit, State},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use super::{
    feedback::{get_stats, post_feedback},
    health::get_health,
    log_requests, metrics, propagate_correlation_id,
    recommend::recommend,
    state::*,
    stream_audio::stream_audio,
    ServerConfig,
};
use crate::config::InferenceSettings;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub song_library: bool,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        song_library: state.library.is_configured(),
    };
    Json(stats)
}

pub fn make_app(state: ServerState) -> Router {
    // Uploads are capped while streaming to disk, see `recommend`.
    let api_routes: Router = Router::new()
        .route(
            "/recomendar",
            post(recommend).layer(DefaultBodyLimit::disable()),
        )
        .route("/audio/{song_id}", get(stream_audio))
        .route("/feedback", post(post_feedback))
        .route("/stats", get(get_stats))
        .route("/health", get(get_health))
        .with_state(state.clone());

    let home_router: Router = match &state.config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    home_router
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .layer(middleware::from_fn(propagate_correlation_id))
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics::metrics_handler))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}

pub async fn run_server(
    config: ServerConfig,
    inference_settings: InferenceSettings,
    inference: GuardedInferenceRunner,
    telemetry: GuardedTelemetryStore,
) -> Result<()> {
    let port = config.port;
    let metrics_port = config.metrics_port;
    let state = ServerState::new(config, inference_settings, inference, telemetry);
    let app = make_app(state);

    let metrics_listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, make_metrics_app()).await {
            error!("Metrics server stopped: {}", e);
        }
    });

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

//! The HTTP entrypoint: one endpoint per application run plus session CRUD.

use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use jobpilot_agent::AgentRuntime;
use jobpilot_core::types::TaskRequest;
use jobpilot_core::{Config, Paths};
use jobpilot_providers::create_provider;
use jobpilot_storage::{PlatformSessionStore, SubmissionLog};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[derive(Clone)]
struct AppState {
    runtime: Arc<AgentRuntime>,
    sessions: Arc<PlatformSessionStore>,
    /// Runs share the machine's browser and display; serialize them.
    run_lock: Arc<tokio::sync::Mutex<()>>,
}

pub async fn run(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let paths = Paths::new();
    paths.ensure_dirs()?;
    let config = Config::load_or_default(&paths)?;

    let provider = create_provider(&config, &config.agent.model)?;
    let sessions = Arc::new(PlatformSessionStore::open(&paths.db_file())?);
    let submissions = Arc::new(SubmissionLog::open(&paths.db_file())?);

    let bind_host = host.unwrap_or_else(|| config.server.host.clone());
    let bind_port = port.unwrap_or(config.server.port);

    let runtime = Arc::new(AgentRuntime::new(
        config,
        paths,
        provider,
        sessions.clone(),
        submissions,
    ));

    let state = AppState {
        runtime,
        sessions,
        run_lock: Arc::new(tokio::sync::Mutex::new(())),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/apply", post(apply))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:username/:platform", delete(delete_session))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", bind_host, bind_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "jobpilot server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn apply(
    State(state): State<AppState>,
    Json(request): Json<TaskRequest>,
) -> impl IntoResponse {
    info!(
        url = %request.url,
        platform = %request.platform,
        resume_len = request.resume_text.len(),
        "Apply request received"
    );

    // One run at a time; later requests queue here.
    let _guard = state.run_lock.lock().await;

    match state.runtime.run_task(&request).await {
        Ok(result) => (
            StatusCode::OK,
            Json(json!({"status": "completed", "result": result})),
        ),
        Err(e) => {
            error!(error = %e, "Apply request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "detail": e.to_string()})),
            )
        }
    }
}

async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    match state.sessions.list() {
        Ok(rows) => {
            let sessions: Vec<_> = rows
                .into_iter()
                .map(|(username, platform, updated_at)| {
                    json!({
                        "username": username,
                        "platform": platform,
                        "updated_at": updated_at,
                    })
                })
                .collect();
            (StatusCode::OK, Json(json!({"sessions": sessions})))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "error", "detail": e.to_string()})),
        ),
    }
}

async fn delete_session(
    State(state): State<AppState>,
    AxumPath((username, platform)): AxumPath<(String, String)>,
) -> impl IntoResponse {
    match state.sessions.delete(&username, &platform) {
        Ok(true) => (StatusCode::OK, Json(json!({"status": "deleted"}))),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({"status": "error", "detail": "session not found"})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "error", "detail": e.to_string()})),
        ),
    }
}

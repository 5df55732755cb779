use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;

mod config;
mod handlers;
mod state;

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    couriercore_core::logging::init();

    let config = Config::from_env();
    let state = Arc::new(AppState::new(&config)?);

    // Downstream transports subscribe to the broadcast publisher; until one
    // is wired in, surface published events in the log.
    let mut events = state.events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::debug!(session_id = %event.session_id(), "tracking event published");
        }
    });

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting courierd on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Assignments
        .route(
            "/api/assignments/manual",
            post(handlers::create_manual_assignment),
        )
        .route(
            "/api/assignments/auto",
            post(handlers::create_auto_assignment),
        )
        .route(
            "/api/assignments/:id/accept",
            post(handlers::accept_assignment),
        )
        // Sessions
        .route("/api/sessions", post(handlers::create_session))
        .route("/api/sessions/:id/start", post(handlers::start_session))
        .route("/api/sessions/:id/finish", post(handlers::finish_session))
        .route("/api/sessions/:id/track", post(handlers::add_tracking_point))
        // Tasks
        .route("/api/tasks/:parcel_id/complete", post(handlers::complete_task))
        .route("/api/tasks/:parcel_id/fail", post(handlers::fail_task))
        .route("/api/shippers/:id/tasks/daily", get(handlers::daily_tasks))
        .route("/api/shippers/:id/tasks", get(handlers::tasks_between))
        // Routes
        .route("/api/routes/compute", post(handlers::compute_route))
        // Health
        .route("/health", get(handlers::health_check))
        .with_state(state)
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

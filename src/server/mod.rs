pub mod error;
pub mod export;
pub mod registry;
pub mod settings;
pub mod state;
pub mod tarball;

use anyhow::Result;
use axum::Router;
use state::AppState;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

/// A route-registration callback. Each module contributes its routes through
/// one of these instead of registering against a global engine.
pub type SetupRouter = fn() -> Router<AppState>;

/// Build the application router from an explicit list of route-registration
/// callbacks.
pub fn build_router(state: AppState, routes: &[SetupRouter]) -> Router {
    let mut router = Router::new();
    for setup in routes {
        router = router.merge(setup());
    }
    router
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Run the HTTP server until SIGINT/SIGTERM.
pub async fn run_server(settings: settings::Settings) -> Result<()> {
    let state = AppState::new(&settings);
    let app = build_router(state, &[export::routes::routes]);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    info!("HTTP server listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}

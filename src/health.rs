//! Liveness endpoint for hosting platforms.
//!
//! Answers independently of the Telegram clients, so the process reports
//! healthy as soon as it is listening.

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tracing::info;

/// Body returned by every health route.
pub const HEALTH_BODY: &str = "Nexus is running!";

async fn health() -> &'static str {
    HEALTH_BODY
}

/// Router with `GET /` and `GET /health`.
pub fn router() -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
}

/// Binds the health listener on `0.0.0.0:port`.
///
/// # Errors
///
/// Returns an error if the port cannot be bound.
pub async fn bind(port: u16) -> std::io::Result<TcpListener> {
    TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await
}

/// Serves the health router on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve<F>(listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Health check server listening on {}", listener.local_addr()?);

    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Health check server stopped");
    Ok(())
}

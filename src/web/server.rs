//! HTTP server for the query page.

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::web::Answerer;
use crate::web::page::{self, Outcome};
use axum::Router;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub answerer: Arc<dyn Answerer>,
}

impl AppState {
    pub fn new(answerer: Arc<dyn Answerer>) -> Self {
        Self { answerer }
    }
}

#[derive(Debug, Deserialize)]
pub struct AskParams {
    question: Option<String>,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new().route("/", get(index)).with_state(state)
}

async fn index(State(state): State<AppState>, Query(params): Query<AskParams>) -> Html<String> {
    let question = match params.question {
        Some(q) if !q.is_empty() => q,
        _ => return Html(page::render(&Outcome::Empty)),
    };

    let outcome = match state.answerer.answer(&question).await {
        Ok(result) => Outcome::Answered { question, result },
        Err(e) => {
            warn!(error = %e, "Question failed");
            let error = match e.suggestion() {
                Some(hint) => format!("{} ({})", e, hint),
                None => e.to_string(),
            };
            Outcome::Failed { question, error }
        }
    };
    Html(page::render(&outcome))
}

/// Serves the query page until SIGINT or SIGTERM, then closes the pool.
pub struct HttpServer {
    state: AppState,
    pool: DbPool,
    /// Host to bind to
    host: String,
    /// Port to bind to
    port: u16,
}

impl HttpServer {
    pub fn new(answerer: Arc<dyn Answerer>, pool: DbPool, host: impl Into<String>, port: u16) -> Self {
        Self {
            state: AppState::new(answerer),
            pool,
            host: host.into(),
            port,
        }
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub async fn run(&self) -> AppResult<()> {
        let bind_addr = self.bind_addr();
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            AppError::connection(
                format!("Failed to bind to {}: {}", bind_addr, e),
                "Check that the port is available or set ASKDB_HTTP_PORT",
            )
        })?;
        info!(addr = %bind_addr, "Query page ready at http://{}/", bind_addr);

        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> AppResult<()> {
        // A slow model call can hold a request open for a while
        const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();

        let shutdown_signal = async move {
            wait_for_signal().await;
            shutdown_notify_clone.notify_one();
        };

        let app = router(self.state.clone());
        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        self.pool.close().await;
                        return Err(AppError::internal(format!("HTTP server error: {}", e)));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for in-flight requests (send signal again to force exit)..."
                );

                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        info!("Closing database connections");
        self.pool.close().await;

        Ok(())
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ConnectionDescriptor;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Answerer for Echo {
        async fn answer(&self, question: &str) -> AppResult<String> {
            Ok(question.to_uppercase())
        }
    }

    async fn memory_pool() -> DbPool {
        let descriptor = ConnectionDescriptor::from_url("sqlite::memory:").unwrap();
        DbPool::connect(&descriptor, false).await.unwrap()
    }

    #[tokio::test]
    async fn test_bind_addr() {
        let server = HttpServer::new(Arc::new(Echo), memory_pool().await, "0.0.0.0", 8501);
        assert_eq!(server.bind_addr(), "0.0.0.0:8501");
    }

    #[tokio::test]
    async fn test_bind_failure_is_connection_error() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = occupied.local_addr().unwrap().port();
        let server = HttpServer::new(Arc::new(Echo), memory_pool().await, "127.0.0.1", port);

        let err = server.run().await.unwrap_err();
        assert!(matches!(err, AppError::Connection { .. }));
    }
}

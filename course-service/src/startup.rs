//! Application startup and lifecycle management.

use crate::config::CourseConfig;
use crate::handlers;
use crate::services::generation::Orchestrator;
use crate::services::providers::{ContentGenerator, ProviderGateway};
use crate::services::{ContentRepository, Database};
use axum::middleware::from_fn;
use axum::{
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn ContentRepository>,
    pub generator: Arc<dyn ContentGenerator>,
    pub orchestrator: Orchestrator,
    /// Present when backed by PostgreSQL; used by the health check.
    pub db: Option<Database>,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn ContentRepository>,
        generator: Arc<dyn ContentGenerator>,
        step_delay: Duration,
    ) -> Self {
        let orchestrator = Orchestrator::new(repo.clone(), generator.clone(), step_delay);
        Self {
            repo,
            generator,
            orchestrator,
            db: None,
        }
    }

    pub fn with_database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route(
            "/api/tipos-contenido-ia",
            get(handlers::content_types::list_ai_content_types),
        )
        .route(
            "/api/tipos-contenido",
            get(handlers::content_types::list_content_types),
        )
        .route(
            "/api/tipo-contenido/:id/toggle-ia",
            post(handlers::content_types::toggle_ai),
        )
        .route(
            "/api/obtener-apikey/:servicio",
            get(handlers::credentials::get_api_key),
        )
        .route(
            "/api/verificar_apikey",
            post(handlers::credentials::verify_api_key),
        )
        .route(
            "/api/configuracion",
            post(handlers::credentials::save_credentials),
        )
        .route("/api/tema/:id", get(handlers::topics::get_topic_content))
        .route(
            "/api/generar_paso_ia",
            post(handlers::generation::generate_step),
        )
        .route(
            "/api/autocompletar/:id_tema",
            get(handlers::generation::autocomplete),
        )
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: CourseConfig) -> Result<Self, AppError> {
        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to PostgreSQL: {}", e);
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!("Failed to run database migrations: {}", e);
            e
        })?;

        let gateway = ProviderGateway::new(config.providers.clone()).map_err(|e| {
            tracing::error!("Failed to initialize provider gateway: {}", e);
            AppError::InternalError(anyhow::anyhow!(e))
        })?;

        tracing::info!(
            gemini_model = %config.providers.gemini.model,
            claude_model = %config.providers.claude.model,
            openai_model = %config.providers.openai.model,
            deepseek_model = %config.providers.deepseek.model,
            "Initialized provider gateway"
        );

        let state = AppState::new(
            Arc::new(db.clone()),
            Arc::new(gateway),
            config.generation.step_delay,
        )
        .with_database(db);

        // Port 0 picks a random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Course service: HTTP on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a reference to the database.
    pub fn db(&self) -> Option<&Database> {
        self.state.db.as_ref()
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

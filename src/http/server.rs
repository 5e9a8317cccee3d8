//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with public and admin handlers
//! - Wire up middleware (tracing, timeouts)
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::config::ServiceConfig;
use crate::http::ApiError;
use crate::lifecycle::{Services, Shutdown};
use crate::modules::auth::PasswordLimits;
use crate::reconcile::Reconciler;
use crate::runtime::RuntimeConfig;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub runtime: RuntimeConfig,
    pub reconciler: Arc<Reconciler>,
    pub admin_api_key: Arc<str>,
}

/// HTTP server for the runtime config service.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
}

impl HttpServer {
    pub fn new(config: ServiceConfig, services: Services) -> Self {
        let state = AppState {
            runtime: services.runtime,
            reconciler: services.reconciler,
            admin_api_key: Arc::from(config.admin.api_key.as_str()),
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/health", get(health))
            .route("/api/v1/credentials", get(credentials_requirement))
            .with_state(state.clone());

        if config.admin.enabled {
            router = router.merge(setup_admin_router(state));
        }

        router
            .layer(TimeoutLayer::new(Duration::from_secs(config.listener.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// The assembled router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            admin = self.config.admin.enabled,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(Shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct CredentialsRequirement {
    password: PasswordLimits,
}

/// Password requirements clients must enforce before sign-up.
async fn credentials_requirement(State(state): State<AppState>) -> Result<Json<CredentialsRequirement>, ApiError> {
    let password = PasswordLimits::load(&state.runtime).await?;
    Ok(Json(CredentialsRequirement { password }))
}

use crate::{
    app::ComponentStates,
    config::{HttpConfig, ServiceConfig},
    error::{Result, ServiceError},
    model::Model,
    readiness::ReadinessState,
    registration::ConnectionTracker,
};
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::handlers::{health_handler, predict_handler, root_handler, status_handler};

/// Shared state for the Axum server
#[derive(Clone)]
pub struct ServerState {
    pub(crate) readiness: Arc<ReadinessState>,
    pub(crate) model: Arc<dyn Model>,
    pub(crate) images_dir: Arc<PathBuf>,
    pub(crate) connection: Arc<ConnectionTracker>,
    pub(crate) components: ComponentStates,
}

impl ServerState {
    pub fn new(
        readiness: Arc<ReadinessState>,
        model: Arc<dyn Model>,
        images_dir: PathBuf,
        connection: Arc<ConnectionTracker>,
        components: ComponentStates,
    ) -> Self {
        Self {
            readiness,
            model,
            images_dir: Arc::new(images_dir),
            connection,
            components,
        }
    }
}

/// Routes with CORS and request tracing applied
pub fn router(state: ServerState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/status", get(status_handler))
        .route("/predict", post(predict_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

/// HTTP front of the model service
pub struct ApiServer {
    pub(crate) config: ServiceConfig,
    pub(crate) http: HttpConfig,
    pub(crate) state: ServerState,
}

impl ApiServer {
    pub fn new(config: ServiceConfig, http: HttpConfig, state: ServerState) -> Self {
        Self {
            config,
            http,
            state,
        }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone(), &self.http.cors_origins)
    }

    /// Bind the listener up front so bind failures surface before startup continues
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = format!("{}:{}", self.config.ip, self.config.port);

        TcpListener::bind(&addr).await.map_err(|e| {
            ServiceError::component("http".to_string(), format!("failed to bind {}: {}", addr, e))
        })
    }

    /// Serve until `shutdown` is cancelled, letting in-flight requests finish
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let addr = listener.local_addr()?;
        info!("Model service listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("HTTP server on {} stopped", addr);
        Ok(())
    }
}

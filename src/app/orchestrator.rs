use super::runtime::ShutdownTrigger;
use super::{ComponentState, ComponentStates, ShutdownReason};
use crate::api::ServerState;
use crate::config::ModelServiceConfig;
use crate::error::Result;
use crate::model::{Model, PlaceholderModel};
use crate::pool::WorkerPool;
use crate::readiness::ReadinessState;
use crate::registration::{ConnectionTracker, CoordinatorApi, HttpCoordinator, ServiceIdentity};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Owns the service's shared state and drives its startup and shutdown
pub struct ServiceOrchestrator {
    pub(super) config: ModelServiceConfig,
    pub(super) identity: ServiceIdentity,
    pub(super) readiness: Arc<ReadinessState>,
    pub(super) connection: Arc<ConnectionTracker>,
    pub(super) model: Arc<dyn Model>,
    pub(super) coordinator: Arc<dyn CoordinatorApi>,
    pub(super) pool: Arc<WorkerPool>,
    pub(super) components: ComponentStates,
    pub(super) started: AtomicBool,

    // Lifecycle management
    pub(super) shutdown_trigger: ShutdownTrigger,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl ServiceOrchestrator {
    /// Create an orchestrator with the placeholder model and an HTTP coordinator
    pub fn new(config: ModelServiceConfig) -> Result<Self> {
        let model = Arc::new(PlaceholderModel::from_config(&config.model));
        let coordinator = Arc::new(HttpCoordinator::new(&config.coordinator)?);
        Ok(Self::with_parts(config, model, coordinator))
    }

    /// Create an orchestrator around a specific model and coordinator
    pub fn with_parts(
        config: ModelServiceConfig,
        model: Arc<dyn Model>,
        coordinator: Arc<dyn CoordinatorApi>,
    ) -> Self {
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Self {
            identity: config.identity(),
            pool: Arc::new(WorkerPool::new(config.system.worker_pool_size)),
            config,
            readiness: Arc::new(ReadinessState::new()),
            connection: Arc::new(ConnectionTracker::new()),
            model,
            coordinator,
            components: ComponentStates::default(),
            started: AtomicBool::new(false),
            shutdown_trigger: ShutdownTrigger::new(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    pub fn readiness(&self) -> Arc<ReadinessState> {
        Arc::clone(&self.readiness)
    }

    pub fn connection(&self) -> Arc<ConnectionTracker> {
        Arc::clone(&self.connection)
    }

    pub fn components(&self) -> ComponentStates {
        self.components.clone()
    }

    pub async fn component_state(&self, component: &str) -> Option<ComponentState> {
        self.components.get(component).await
    }

    /// Handle that asks a running [`ServiceOrchestrator::run`] to shut down
    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.shutdown_trigger.clone()
    }

    /// State handed to the HTTP surface
    pub fn server_state(&self) -> ServerState {
        ServerState::new(
            Arc::clone(&self.readiness),
            Arc::clone(&self.model),
            self.config.model.images_dir.clone(),
            Arc::clone(&self.connection),
            self.components.clone(),
        )
    }
}

use super::{
    ComponentState, ComponentStates, ServiceOrchestrator, StartupAck, HTTP_COMPONENT,
    MODEL_COMPONENT, REGISTRATION_COMPONENT,
};
use crate::error::{Result, ServiceError};
use crate::model::Model;
use crate::pool::WorkerPool;
use crate::readiness::ReadinessState;
use crate::registration::{
    ConnectionTracker, CoordinatorApi, RegistrationSession, ServiceIdentity, SessionTiming,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

impl ServiceOrchestrator {
    /// Register every component as stopped
    pub async fn initialize(&self) {
        info!("Initializing model service components");

        self.components
            .set(MODEL_COMPONENT, ComponentState::Stopped)
            .await;
        self.components
            .set(REGISTRATION_COMPONENT, ComponentState::Stopped)
            .await;
        self.components
            .set(HTTP_COMPONENT, ComponentState::Stopped)
            .await;
    }

    /// Kick off model init in the background and return right away.
    ///
    /// Once init succeeds readiness flips to true and only then does the
    /// registration session start.
    pub async fn start(&self) -> Result<StartupAck> {
        if self.pool.is_closed() {
            warn!("Refusing to start: model service is shutting down");
            return Err(ServiceError::system("model service is shutting down"));
        }

        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Model service already started");
            return Ok(StartupAck::starting());
        }

        info!(
            "Starting model service '{}' with {} background worker(s)",
            self.identity.name,
            self.pool.size()
        );
        self.components
            .set(MODEL_COMPONENT, ComponentState::Starting)
            .await;

        let startup = StartupSequence {
            identity: self.identity.clone(),
            readiness: Arc::clone(&self.readiness),
            connection: Arc::clone(&self.connection),
            model: Arc::clone(&self.model),
            coordinator: Arc::clone(&self.coordinator),
            pool: Arc::clone(&self.pool),
            components: self.components.clone(),
            timing: SessionTiming::from(&self.config.coordinator),
            shutdown: self.cancellation_token.clone(),
        };

        if let Err(e) = self.pool.spawn("model_init", startup.run()) {
            error!("Failed to schedule model initialization: {}", e);
            self.components
                .set(MODEL_COMPONENT, ComponentState::Failed)
                .await;
            return Err(e);
        }

        Ok(StartupAck::starting())
    }
}

/// Everything the background startup needs, detached from the orchestrator
struct StartupSequence {
    identity: ServiceIdentity,
    readiness: Arc<ReadinessState>,
    connection: Arc<ConnectionTracker>,
    model: Arc<dyn Model>,
    coordinator: Arc<dyn CoordinatorApi>,
    pool: Arc<WorkerPool>,
    components: ComponentStates,
    timing: SessionTiming,
    shutdown: CancellationToken,
}

impl StartupSequence {
    async fn run(self) {
        let model = Arc::clone(&self.model);
        let init = tokio::task::spawn_blocking(move || model.init());

        // The blocking thread cannot be interrupted. Leave it to finish on its
        // own; readiness is closed by then so it cannot reopen the service.
        let outcome = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                info!("Shutdown began during model initialization");
                self.components
                    .set(MODEL_COMPONENT, ComponentState::Stopped)
                    .await;
                return;
            }
            outcome = init => outcome,
        };

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Model initialization failed: {}", e);
                self.components
                    .set(MODEL_COMPONENT, ComponentState::Failed)
                    .await;
                return;
            }
            Err(e) => {
                error!("Model initialization task failed: {}", e);
                self.components
                    .set(MODEL_COMPONENT, ComponentState::Failed)
                    .await;
                return;
            }
        }

        if !self.readiness.mark_ready() {
            info!("Model initialized after shutdown began, not accepting predictions");
            self.components
                .set(MODEL_COMPONENT, ComponentState::Stopped)
                .await;
            return;
        }

        self.components
            .set(MODEL_COMPONENT, ComponentState::Running)
            .await;
        info!("Model initialized and ready to receive predictions");

        self.start_registration().await;
    }

    async fn start_registration(self) {
        self.components
            .set(REGISTRATION_COMPONENT, ComponentState::Starting)
            .await;

        let session = RegistrationSession::new(
            self.identity,
            self.coordinator,
            self.connection,
            self.timing,
            self.shutdown,
        );

        let components = self.components.clone();
        let spawned = self.pool.spawn("registration", async move {
            components
                .set(REGISTRATION_COMPONENT, ComponentState::Running)
                .await;
            session.run().await;
            components
                .set(REGISTRATION_COMPONENT, ComponentState::Stopped)
                .await;
        });

        if let Err(e) = spawned {
            warn!("Registration not started: {}", e);
            self.components
                .set(REGISTRATION_COMPONENT, ComponentState::Stopped)
                .await;
        }
    }
}

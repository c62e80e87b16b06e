use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{
    ConnectionState, ConnectionTracker, CoordinatorApi, LivenessMonitor, RegistrationClient,
    ServiceIdentity,
};
use crate::config::CoordinatorConfig;

/// Wait intervals for the two phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    pub retry_interval: Duration,
    pub probe_interval: Duration,
}

impl From<&CoordinatorConfig> for SessionTiming {
    fn from(config: &CoordinatorConfig) -> Self {
        Self {
            retry_interval: config.retry_interval(),
            probe_interval: config.probe_interval(),
        }
    }
}

/// Register-then-probe state machine for one identity.
///
/// Runs as a single task, so registration and probing never overlap.
pub struct RegistrationSession {
    identity: ServiceIdentity,
    client: RegistrationClient,
    monitor: LivenessMonitor,
    tracker: Arc<ConnectionTracker>,
}

impl RegistrationSession {
    pub fn new(
        identity: ServiceIdentity,
        coordinator: Arc<dyn CoordinatorApi>,
        tracker: Arc<ConnectionTracker>,
        timing: SessionTiming,
        shutdown: CancellationToken,
    ) -> Self {
        let client = RegistrationClient::new(
            Arc::clone(&coordinator),
            Arc::clone(&tracker),
            timing.retry_interval,
            shutdown.clone(),
        );
        let monitor = LivenessMonitor::new(
            coordinator,
            Arc::clone(&tracker),
            timing.probe_interval,
            shutdown,
        );

        Self {
            identity,
            client,
            monitor,
            tracker,
        }
    }

    /// Drive the state machine until shutdown. Always ends in `Stopped`.
    pub async fn run(self) -> ConnectionState {
        info!("Starting registration session for {}", self.identity);

        let mut state = self.tracker.current();
        loop {
            state = match state {
                ConnectionState::Unregistered
                | ConnectionState::Registering
                | ConnectionState::Disconnected => self.client.register(&self.identity).await,
                ConnectionState::Connected => self.monitor.monitor(&self.identity).await,
                ConnectionState::Stopped => break,
            };
        }

        info!("Registration session for {} stopped", self.identity.name);
        state
    }
}

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ConnectionState, ConnectionTracker, CoordinatorApi, ServiceIdentity};

/// Registers the service with the coordinator, retrying on a fixed interval
pub struct RegistrationClient {
    coordinator: Arc<dyn CoordinatorApi>,
    tracker: Arc<ConnectionTracker>,
    retry_interval: Duration,
    shutdown: CancellationToken,
}

impl RegistrationClient {
    pub fn new(
        coordinator: Arc<dyn CoordinatorApi>,
        tracker: Arc<ConnectionTracker>,
        retry_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            coordinator,
            tracker,
            retry_interval,
            shutdown,
        }
    }

    /// Retry registration until the coordinator accepts it.
    ///
    /// Returns `Connected` on success, or `Stopped` once shutdown is signalled.
    /// There is no attempt limit and no backoff growth.
    pub async fn register(&self, identity: &ServiceIdentity) -> ConnectionState {
        self.tracker.transition(ConnectionState::Registering);

        loop {
            if self.shutdown.is_cancelled() {
                return self.stop();
            }

            self.tracker.record_registration_attempt();
            match self.coordinator.register(identity).await {
                Ok(()) => {
                    self.tracker.record_contact();
                    self.tracker.transition(ConnectionState::Connected);
                    info!("Registered {} with coordinator", identity);
                    return ConnectionState::Connected;
                }
                Err(e) if e.is_transient() => {
                    debug!(
                        "Registering {} failed: {}. Retry in {} seconds",
                        identity.name,
                        e,
                        self.retry_interval.as_secs()
                    );
                }
                Err(e) => {
                    warn!(
                        "Registering {} failed: {}. Retry in {} seconds",
                        identity.name,
                        e,
                        self.retry_interval.as_secs()
                    );
                }
            }

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return self.stop(),
                _ = sleep(self.retry_interval) => {}
            }
        }
    }

    fn stop(&self) -> ConnectionState {
        debug!("Registration stopped by shutdown");
        self.tracker.transition(ConnectionState::Stopped);
        ConnectionState::Stopped
    }
}

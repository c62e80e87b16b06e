use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{ConnectionState, ConnectionTracker, CoordinatorApi, ServiceIdentity};

/// Probes the coordinator while connected
pub struct LivenessMonitor {
    coordinator: Arc<dyn CoordinatorApi>,
    tracker: Arc<ConnectionTracker>,
    probe_interval: Duration,
    shutdown: CancellationToken,
}

impl LivenessMonitor {
    pub fn new(
        coordinator: Arc<dyn CoordinatorApi>,
        tracker: Arc<ConnectionTracker>,
        probe_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            coordinator,
            tracker,
            probe_interval,
            shutdown,
        }
    }

    /// Probe until a probe fails or shutdown is signalled.
    ///
    /// A failed probe demotes the state to `Disconnected` and returns at once so
    /// registration can resume. Returns `Stopped` on shutdown.
    pub async fn monitor(&self, identity: &ServiceIdentity) -> ConnectionState {
        let state = self.tracker.current();
        if state != ConnectionState::Connected {
            return state;
        }

        loop {
            if self.shutdown.is_cancelled() {
                return self.stop();
            }

            self.tracker.record_probe();
            match self.coordinator.probe(identity).await {
                Ok(()) => {
                    self.tracker.record_contact();
                    trace!("Coordinator answered probe for {}", identity.name);
                }
                Err(e) => {
                    if self.shutdown.is_cancelled() {
                        return self.stop();
                    }
                    warn!(
                        "Coordinator is not responsive for {}: {}. Retry registering...",
                        identity.name, e
                    );
                    self.tracker.transition(ConnectionState::Disconnected);
                    return ConnectionState::Disconnected;
                }
            }

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return self.stop(),
                _ = sleep(self.probe_interval) => {}
            }
        }
    }

    fn stop(&self) -> ConnectionState {
        debug!("Liveness monitor stopped by shutdown");
        self.tracker.transition(ConnectionState::Stopped);
        ConnectionState::Stopped
    }
}

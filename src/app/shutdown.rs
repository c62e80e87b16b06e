use super::{
    ComponentState, ServiceOrchestrator, ShutdownReport, MODEL_COMPONENT, REGISTRATION_COMPONENT,
};
use crate::error::Result;
use crate::registration::ConnectionState;
use std::time::Duration;
use tracing::{error, info};

impl ServiceOrchestrator {
    /// Stop serving predictions and wind down background work.
    ///
    /// Readiness is closed before the shutdown token is cancelled, so no request
    /// sees a ready model once loops start exiting. Loops notice the token at
    /// their next check; nothing is interrupted mid-call.
    pub async fn shutdown(&self) -> Result<ShutdownReport> {
        info!("Beginning graceful shutdown");

        self.readiness.close();
        self.cancellation_token.cancel();

        for component in [MODEL_COMPONENT, REGISTRATION_COMPONENT] {
            if matches!(
                self.components.get(component).await,
                Some(ComponentState::Starting | ComponentState::Running)
            ) {
                self.components
                    .set(component, ComponentState::Stopping)
                    .await;
            }
        }

        let timeout = Duration::from_secs(self.config.system.shutdown_timeout_secs);
        let drained = self.pool.shutdown(timeout).await;

        self.connection.transition(ConnectionState::Stopped);

        if let Err(e) = drained {
            error!("Background tasks did not stop cleanly: {}", e);
            // Only components that never finished stopping are to blame
            for component in [MODEL_COMPONENT, REGISTRATION_COMPONENT] {
                if self.components.get(component).await == Some(ComponentState::Stopping) {
                    self.components
                        .set(component, ComponentState::Failed)
                        .await;
                }
            }
            return Err(e);
        }

        for component in [MODEL_COMPONENT, REGISTRATION_COMPONENT] {
            self.components
                .settle(component, ComponentState::Stopped)
                .await;
        }

        let report = ShutdownReport::complete();
        info!("Graceful shutdown completed: {}", report.detail);
        Ok(report)
    }
}

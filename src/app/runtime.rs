use super::{ComponentState, ServiceOrchestrator, ShutdownReason, HTTP_COMPONENT};
use crate::api::ApiServer;
use crate::error::{Result, ServiceError};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Fires the orchestrator's shutdown once; later triggers are ignored
#[derive(Clone)]
pub struct ShutdownTrigger {
    sender: Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>,
}

impl ShutdownTrigger {
    pub(super) fn new(sender: oneshot::Sender<ShutdownReason>) -> Self {
        Self {
            sender: Arc::new(Mutex::new(Some(sender))),
        }
    }

    /// Returns whether this call was the one that requested shutdown
    pub async fn trigger(&self, reason: ShutdownReason) -> bool {
        match self.sender.lock().await.take() {
            Some(sender) => sender.send(reason).is_ok(),
            None => false,
        }
    }
}

impl ServiceOrchestrator {
    /// Serve HTTP, start the model, and block until a shutdown request arrives.
    ///
    /// Returns the process exit code.
    pub async fn run(&mut self) -> Result<i32> {
        let shutdown_receiver =
            self.shutdown_receiver
                .take()
                .ok_or_else(|| ServiceError::System {
                    message: "Shutdown receiver already taken".to_string(),
                })?;

        self.setup_signal_handlers();

        let server = ApiServer::new(
            self.config.service.clone(),
            self.config.http.clone(),
            self.server_state(),
        );
        self.components
            .set(HTTP_COMPONENT, ComponentState::Starting)
            .await;
        let listener = server.bind().await.map_err(|e| {
            error!("Failed to start HTTP server: {}", e);
            e
        })?;

        let server_token = CancellationToken::new();
        let mut server_task = tokio::spawn(server.serve(listener, server_token.clone()));
        self.components
            .set(HTTP_COMPONENT, ComponentState::Running)
            .await;

        let ack = self.start().await?;
        info!("Model service startup: {}", ack.result);

        // Wait for a shutdown request, or for the server to die on its own
        let (reason, server_result) = tokio::select! {
            received = shutdown_receiver => {
                let reason = received.map_err(|_| ServiceError::System {
                    message: "Shutdown channel closed unexpectedly".to_string(),
                })?;
                (reason, None)
            }
            result = &mut server_task => {
                (ShutdownReason::Error("HTTP server exited".to_string()), Some(result))
            }
        };
        info!("Shutdown initiated: {:?}", reason);

        let mut exit_code = match reason {
            ShutdownReason::Error(_) => 1,
            _ => 0,
        };

        if let Err(e) = self.shutdown().await {
            error!("Shutdown error: {}", e);
            exit_code = 1;
        }

        self.components
            .set(HTTP_COMPONENT, ComponentState::Stopping)
            .await;
        server_token.cancel();
        let server_result = match server_result {
            Some(result) => result,
            None => server_task.await,
        };

        match server_result {
            Ok(Ok(())) => {
                self.components
                    .set(HTTP_COMPONENT, ComponentState::Stopped)
                    .await;
            }
            Ok(Err(e)) => {
                error!("HTTP server error: {}", e);
                self.components
                    .set(HTTP_COMPONENT, ComponentState::Failed)
                    .await;
                exit_code = 1;
            }
            Err(e) => {
                error!("HTTP server task failed: {}", e);
                self.components
                    .set(HTTP_COMPONENT, ComponentState::Failed)
                    .await;
                exit_code = 1;
            }
        }

        info!("Model service shutdown complete");
        Ok(exit_code)
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self) {
        // Handle SIGTERM (container stop) - Unix only
        #[cfg(unix)]
        {
            let trigger = self.shutdown_trigger();
            tokio::spawn(async move {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(sigterm) => sigterm,
                        Err(e) => {
                            error!("Failed to register SIGTERM handler: {}", e);
                            return;
                        }
                    };

                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    trigger
                        .trigger(ShutdownReason::Signal("SIGTERM".to_string()))
                        .await;
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let trigger = self.shutdown_trigger();
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                trigger
                    .trigger(ShutdownReason::Signal("SIGINT".to_string()))
                    .await;
            }
        });
    }
}

use async_trait::async_trait;
use serde::Serialize;
use tracing::trace;

use super::ServiceIdentity;
use crate::config::CoordinatorConfig;
use crate::error::{Result, ServiceError};

/// Calls the service makes against its coordinator
#[async_trait]
pub trait CoordinatorApi: Send + Sync {
    /// Announce the service's name and port
    async fn register(&self, identity: &ServiceIdentity) -> Result<()>;

    /// Lightweight check that the coordinator is still reachable
    async fn probe(&self, identity: &ServiceIdentity) -> Result<()>;
}

/// Registration body, `{"modelName": ..., "modelPort": ...}` on the wire
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest<'a> {
    pub model_name: &'a str,
    pub model_port: u16,
}

/// Coordinator reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpCoordinator {
    client: reqwest::Client,
    scheme: String,
    register_path: String,
    probe_path: String,
}

impl HttpCoordinator {
    pub fn new(config: &CoordinatorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            scheme: config.scheme.clone(),
            register_path: config.register_path.clone(),
            probe_path: config.probe_path.clone(),
        })
    }

    fn url(&self, identity: &ServiceIdentity, path: &str) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme, identity.coordinator_address, identity.coordinator_port, path
        )
    }
}

/// Any status outside 4xx/5xx counts as success
fn check_status(response: reqwest::Response, operation: &'static str) -> Result<()> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(ServiceError::Coordinator {
            operation,
            status: status.as_u16(),
        });
    }
    Ok(())
}

#[async_trait]
impl CoordinatorApi for HttpCoordinator {
    async fn register(&self, identity: &ServiceIdentity) -> Result<()> {
        let url = self.url(identity, &self.register_path);
        let body = RegisterRequest {
            model_name: &identity.name,
            model_port: identity.listen_port,
        };
        trace!("POST {}", url);

        let response = self.client.post(&url).json(&body).send().await?;
        check_status(response, "registration")
    }

    async fn probe(&self, identity: &ServiceIdentity) -> Result<()> {
        let url = self.url(identity, &self.probe_path);
        trace!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        check_status(response, "liveness probe")
    }
}

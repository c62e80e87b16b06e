use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::registration::ServiceIdentity;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ModelServiceConfig {
    pub service: ServiceConfig,
    pub coordinator: CoordinatorConfig,
    pub model: ModelConfig,
    pub http: HttpConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Name this service registers under
    #[serde(default = "default_service_name")]
    pub name: String,

    /// IP address to bind to
    #[serde(default = "default_service_ip")]
    pub ip: String,

    /// Port to listen on, also announced to the coordinator
    #[serde(default = "default_service_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CoordinatorConfig {
    /// Coordinator host name
    #[serde(default = "default_coordinator_host")]
    pub host: String,

    /// Coordinator port
    #[serde(default = "default_coordinator_port")]
    pub port: u16,

    /// URL scheme used to reach the coordinator
    #[serde(default = "default_coordinator_scheme")]
    pub scheme: String,

    #[serde(default = "default_register_path")]
    pub register_path: String,

    #[serde(default = "default_probe_path")]
    pub probe_path: String,

    /// Fixed wait between failed registration attempts
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,

    /// Wait between successful liveness probes
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    /// Upper bound on a single coordinator call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ModelConfig {
    /// Directory prediction filenames are resolved against
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,

    /// Simulated work done by the placeholder model's init
    #[serde(default = "default_init_delay")]
    pub init_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HttpConfig {
    /// Origins allowed by the CORS layer
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Number of background tasks allowed to run at once
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    /// How long shutdown waits for background tasks
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

/// Unprefixed environment variables the service has always been deployed with
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyEnv {
    /// SERVER_PORT: coordinator port
    pub server_port: Option<String>,
    /// PORT: this service's port
    pub port: Option<String>,
    /// NAME: registered service name
    pub name: Option<String>,
}

impl LegacyEnv {
    pub fn from_env() -> Self {
        Self {
            server_port: std::env::var("SERVER_PORT").ok(),
            port: std::env::var("PORT").ok(),
            name: std::env::var("NAME").ok(),
        }
    }
}

impl CoordinatorConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ModelServiceConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("model-service.toml")
    }

    /// Load configuration from a specific file path, honouring the process environment
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_layered(path, &LegacyEnv::from_env())
    }

    /// Defaults, then the file, then MODEL_SERVICE_* variables, then the legacy variables
    pub fn load_layered<P: AsRef<Path>>(path: P, legacy: &LegacyEnv) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("service.name", default_service_name())?
            .set_default("service.ip", default_service_ip())?
            .set_default("service.port", default_service_port())?
            .set_default("coordinator.host", default_coordinator_host())?
            .set_default("coordinator.port", default_coordinator_port())?
            .set_default("coordinator.scheme", default_coordinator_scheme())?
            .set_default("coordinator.register_path", default_register_path())?
            .set_default("coordinator.probe_path", default_probe_path())?
            .set_default("coordinator.retry_interval_secs", default_retry_interval())?
            .set_default("coordinator.probe_interval_secs", default_probe_interval())?
            .set_default("coordinator.request_timeout_secs", default_request_timeout())?
            .set_default(
                "model.images_dir",
                default_images_dir().to_string_lossy().into_owned(),
            )?
            .set_default("model.init_delay_ms", default_init_delay())?
            .set_default("http.cors_origins", default_cors_origins())?
            .set_default("system.worker_pool_size", default_worker_pool_size() as i64)?
            .set_default("system.shutdown_timeout_secs", default_shutdown_timeout())?
            .add_source(File::with_name(&path_str).required(false))
            // MODEL_SERVICE_COORDINATOR__PORT=9000 style overrides
            .add_source(
                Environment::with_prefix("MODEL_SERVICE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("http.cors_origins"),
            )
            .set_override_option("coordinator.port", legacy.server_port.clone())?
            .set_override_option("service.port", legacy.port.clone())?
            .set_override_option("service.name", legacy.name.clone())?
            .build()?;

        let config: ModelServiceConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.name.trim().is_empty() {
            return Err(ConfigError::Message(
                "Service name must not be empty".to_string(),
            ));
        }

        if self.service.port == 0 {
            return Err(ConfigError::Message(
                "Service port must be greater than 0".to_string(),
            ));
        }

        if self.coordinator.host.trim().is_empty() {
            return Err(ConfigError::Message(
                "Coordinator host must not be empty".to_string(),
            ));
        }

        if self.coordinator.port == 0 {
            return Err(ConfigError::Message(
                "Coordinator port must be greater than 0".to_string(),
            ));
        }

        if self.coordinator.retry_interval_secs == 0 || self.coordinator.probe_interval_secs == 0
        {
            return Err(ConfigError::Message(
                "Coordinator retry and probe intervals must be greater than 0".to_string(),
            ));
        }

        if self.coordinator.request_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Coordinator request timeout must be greater than 0".to_string(),
            ));
        }

        if self.system.worker_pool_size == 0 {
            return Err(ConfigError::Message(
                "Worker pool size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render as a TOML file `load_from_file` accepts
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Identity announced to the coordinator
    pub fn identity(&self) -> ServiceIdentity {
        ServiceIdentity {
            name: self.service.name.clone(),
            listen_port: self.service.port,
            coordinator_address: self.coordinator.host.clone(),
            coordinator_port: self.coordinator.port,
        }
    }
}

impl Default for ModelServiceConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: default_service_name(),
                ip: default_service_ip(),
                port: default_service_port(),
            },
            coordinator: CoordinatorConfig {
                host: default_coordinator_host(),
                port: default_coordinator_port(),
                scheme: default_coordinator_scheme(),
                register_path: default_register_path(),
                probe_path: default_probe_path(),
                retry_interval_secs: default_retry_interval(),
                probe_interval_secs: default_probe_interval(),
                request_timeout_secs: default_request_timeout(),
            },
            model: ModelConfig {
                images_dir: default_images_dir(),
                init_delay_ms: default_init_delay(),
            },
            http: HttpConfig {
                cors_origins: default_cors_origins(),
            },
            system: SystemConfig {
                worker_pool_size: default_worker_pool_size(),
                shutdown_timeout_secs: default_shutdown_timeout(),
            },
        }
    }
}

// Default value functions
fn default_service_name() -> String {
    "model-service".to_string()
}
fn default_service_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_service_port() -> u16 {
    8000
}

fn default_coordinator_host() -> String {
    "host.docker.internal".to_string()
}
fn default_coordinator_port() -> u16 {
    5000
}
fn default_coordinator_scheme() -> String {
    "http".to_string()
}
fn default_register_path() -> String {
    "/model/register".to_string()
}
fn default_probe_path() -> String {
    "/".to_string()
}
fn default_retry_interval() -> u64 {
    10
}
fn default_probe_interval() -> u64 {
    10
}
fn default_request_timeout() -> u64 {
    5
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("../images")
}
fn default_init_delay() -> u64 {
    1000
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:5057".to_string(),
        "http://localhost:5000".to_string(),
        "http://localhost:6379".to_string(),
    ]
}

fn default_worker_pool_size() -> usize {
    10
}
fn default_shutdown_timeout() -> u64 {
    15
}

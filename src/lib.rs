pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod model;
pub mod pool;
pub mod readiness;
pub mod registration;

pub use api::{ApiServer, ServerState};
pub use app::{ComponentState, ServiceOrchestrator, ShutdownReason, ShutdownReport, StartupAck};
pub use config::ModelServiceConfig;
pub use error::{ApiError, Result, ServiceError};
pub use model::{Model, PlaceholderModel, Prediction};
pub use pool::WorkerPool;
pub use readiness::ReadinessState;
pub use registration::{
    ConnectionState, ConnectionTracker, CoordinatorApi, HttpCoordinator, RegistrationSession,
    ServiceIdentity,
};

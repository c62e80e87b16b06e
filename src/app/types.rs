use serde::Serialize;

pub const MODEL_COMPONENT: &str = "model";
pub const REGISTRATION_COMPONENT: &str = "registration";
pub const HTTP_COMPONENT: &str = "http";

/// Component lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// Why the service is shutting down
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    UserRequest,
}

/// Returned by startup while the model initializes in the background
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartupAck {
    pub result: String,
}

impl StartupAck {
    pub fn starting() -> Self {
        Self {
            result: "starting".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    pub status: String,
    pub detail: String,
}

impl ShutdownReport {
    pub fn complete() -> Self {
        Self {
            status: "success".to_string(),
            detail: "Deregister complete and server shutting down.".to_string(),
        }
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Coordinator answered {operation} with status {status}")]
    Coordinator { operation: &'static str, status: u16 },

    #[error("Model error: {message}")]
    Model { message: String },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl ServiceError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn model<S: Into<String>>(message: S) -> Self {
        Self::Model {
            message: message.into(),
        }
    }

    /// Failures the registration and liveness loops absorb by retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::Coordinator { .. } | Self::Io(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors surfaced to HTTP callers
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Model is not ready to receive predictions.")]
    NotReady,

    #[error("Model has not been configured. Please run initial startup before attempting to receive predictions.")]
    ModelNotConfigured,

    #[error("Unable to open image file. Provided filename can not be found on server.")]
    FileNotFound,

    #[error("Prediction failed: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotReady | Self::ModelNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::FileNotFound => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        Self::Internal(error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = self.to_string();

        // /status keeps the {status, detail} envelope, the rest only carry detail
        let body = match self {
            Self::NotReady => serde_json::json!({ "status": "failure", "detail": detail }),
            _ => serde_json::json!({ "detail": detail }),
        };

        (status, Json(body)).into_response()
    }
}

//! Shared error and result types for Gatehouse

use hyper::StatusCode;
use thiserror::Error;

/// Errors raised by stores, handlers and the HTTP layer
#[derive(Error, Debug)]
pub enum GatehouseError {
    /// Malformed or missing input
    #[error("{0}")]
    BadRequest(String),

    /// Unknown account, route, link or token
    #[error("{0}")]
    NotFound(String),

    /// The resource already exists in a conflicting state
    #[error("{0}")]
    Conflict(String),

    /// The identity is known but not allowed to do this
    #[error("{0}")]
    Forbidden(String),

    #[error("{method} is not allowed on this resource")]
    MethodNotAllowed { method: String },

    /// The operation is unsupported, or a handler does not apply to the input
    #[error("{0}")]
    NotImplemented(String),

    /// Redirect to another location
    #[error("Redirecting to {location}")]
    Found { location: String },

    /// Data-integrity violation; always logged at error severity
    #[error("{0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatehouseError {
    /// HTTP status code this error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatehouseError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatehouseError::NotFound(_) => StatusCode::NOT_FOUND,
            GatehouseError::Conflict(_) => StatusCode::CONFLICT,
            GatehouseError::Forbidden(_) => StatusCode::FORBIDDEN,
            GatehouseError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            GatehouseError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            GatehouseError::Found { .. } => StatusCode::FOUND,
            GatehouseError::Internal(_)
            | GatehouseError::Json(_)
            | GatehouseError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short error name used in JSON error bodies
    pub fn name(&self) -> &'static str {
        match self {
            GatehouseError::BadRequest(_) => "BadRequestHttpError",
            GatehouseError::NotFound(_) => "NotFoundHttpError",
            GatehouseError::Conflict(_) => "ConflictHttpError",
            GatehouseError::Forbidden(_) => "ForbiddenHttpError",
            GatehouseError::MethodNotAllowed { .. } => "MethodNotAllowedHttpError",
            GatehouseError::NotImplemented(_) => "NotImplementedHttpError",
            GatehouseError::Found { .. } => "FoundHttpError",
            _ => "InternalServerError",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatehouseError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, GatehouseError>;

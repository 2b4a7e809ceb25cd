use std::collections::BTreeMap;

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use garde::Report;
use http::StatusCode;
use serde_json::json;
use tracing::{debug, error};

pub type ApiResult<T, E = ApiError> = std::result::Result<T, E>;

pub const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";
pub const NOT_PERMITTED: &str = "You do not have permission to perform this action.";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidQuery(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] Report),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{NOT_AUTHENTICATED}")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    ResourceNotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(agora_dal::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn not_permitted() -> Self {
        ApiError::Forbidden(NOT_PERMITTED.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidQuery(_) | ApiError::InvalidRequest(_) | ApiError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Unauthenticated | ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::DatabaseError(_) | ApiError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<agora_dal::Error> for ApiError {
    fn from(value: agora_dal::Error) -> Self {
        use agora_dal::Error;
        match value {
            Error::RecordNotFound(what) => ApiError::ResourceNotFound(what),
            Error::InvalidCredentials => ApiError::InvalidCredentials,
            Error::InvalidOrderByField(field) => {
                ApiError::InvalidQuery(format!("Invalid ordering field: {field}"))
            }
            Error::AlreadyExists(msg) | Error::InvalidReference(msg) | Error::InvalidOperation(msg) => {
                ApiError::InvalidRequest(msg)
            }
            other => ApiError::DatabaseError(other),
        }
    }
}

impl From<agora_auth::Error> for ApiError {
    fn from(value: agora_auth::Error) -> Self {
        ApiError::InternalError(value.to_string())
    }
}

/// Groups validation messages by field path, errors of whole object go under `non_field_errors`
pub fn validation_errors(report: &Report) -> serde_json::Value {
    let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (path, error) in report.iter() {
        let mut field = path.to_string();
        if field.is_empty() {
            field = "non_field_errors".to_string();
        }
        errors
            .entry(field)
            .or_default()
            .push(error.message().to_string());
    }
    json!({ "errors": errors })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {self}");
        } else {
            debug!("Request rejected ({status}): {self}");
        }
        let body = match &self {
            ApiError::Validation(report) => validation_errors(report),
            ApiError::DatabaseError(_) | ApiError::InternalError(_) => {
                json!({ "error": "Internal server error" })
            }
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

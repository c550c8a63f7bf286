//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Malformed token in a field tag. Fatal for the owning record type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    #[error("'{token}' tag value '{value}' is not a valid integer")]
    BadInt { token: &'static str, value: String },
    #[error("'link' tag value '{value}' is not an alphanumeric field name")]
    BadLink { value: String },
}

/// Schema construction failure. Fatal for the owning record type: the
/// registry caches it and every later operation on the type gets a clone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("field '{field}': {source}")]
    Tag {
        field: &'static str,
        #[source]
        source: TagError,
    },
    #[error("field '{field}': link target '{target}' does not exist")]
    UnresolvedLink { field: &'static str, target: String },
    #[error("field '{field}': regexp does not compile: {message}")]
    Pattern { field: &'static str, message: String },
    #[error("record type '{type_name}' must declare 'id: i64' as its first field")]
    MissingIdentity { type_name: String },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<&'static str>),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Error::Schema(_) => (StatusCode::INTERNAL_SERVER_ERROR, "schema_error"),
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Error::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
        };
        let details = match &self {
            Error::Validation(fields) => Some(serde_json::json!({ "fields": fields })),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

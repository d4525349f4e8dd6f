use crate::db::errors::DbError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Login attempt with an unknown login or a wrong password
    #[error("Invalid login or password")]
    InvalidCredentials,

    /// Caller is authenticated but lacks a required role for the action
    #[error("Forbidden: {action} requires one of {required:?}")]
    Forbidden { action: String, required: Vec<String> },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found (or not visible to the caller)
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Upload larger than the configured limit
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// Conflict error, e.g. deleting a role that is still referenced
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Repository operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } | Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Internal { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } | DbError::Referenced { .. } => StatusCode::CONFLICT,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::InvalidCredentials => "Invalid login or password".to_string(),
            // The required roles stay in the logs only
            Error::Forbidden { .. } => "Insufficient permissions".to_string(),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::Conflict { message } | Error::PayloadTooLarge { message } => message.clone(),
            Error::Internal { .. } | Error::Other(_) => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation {
                    table: "users", field: "login", ..
                } => "This login is already taken".to_string(),
                DbError::UniqueViolation {
                    table: "roles", field: "name", ..
                } => "A role with this name already exists".to_string(),
                DbError::UniqueViolation { .. } => "Resource already exists".to_string(),
                DbError::Referenced {
                    entity_type, referenced_by, ..
                } => format!("Cannot delete {entity_type}: still referenced by {referenced_by}"),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) | Error::Conflict { .. } => {
                tracing::warn!("Conflict error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::InvalidCredentials | Error::Forbidden { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } | Error::PayloadTooLarge { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();

        match &self {
            Error::Conflict { .. } | Error::Database(DbError::UniqueViolation { .. } | DbError::Referenced { .. }) => {
                let body = serde_json::json!({ "message": self.user_message() });
                (status, axum::response::Json(body)).into_response()
            }
            _ => (status, self.user_message()).into_response(),
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

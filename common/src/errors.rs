//! Application error types.
//!
//! Every error a request can end in is a variant of [`AppError`]; the
//! `IntoResponse` impl renders it as the JSON body clients expect.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced by the service.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Request body carried no usable natural-language question.
    #[error("Missing natural query")]
    MissingQuery,

    /// The LLM produced no usable SQL text.
    #[error("AI failed to generate SQL")]
    GenerationFailed,

    /// The database rejected or failed to run the generated statement.
    #[error("SQL Execution Failed")]
    ExecutionFailed {
        /// Raw message reported by the database driver.
        details: String,
        /// The statement that was attempted.
        sql: String,
    },

    /// An upstream HTTP service misbehaved.
    ///
    /// The SQL generator logs this and reports [`AppError::GenerationFailed`]
    /// instead, so it does not reach a response on its own.
    #[error("external service error: {0}")]
    ExternalService(String),

    /// The database pool could not be set up.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingQuery => StatusCode::BAD_REQUEST,
            AppError::GenerationFailed
            | AppError::ExecutionFailed { .. }
            | AppError::ExternalService(_)
            | AppError::DatabaseConnection(_)
            | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body.
///
/// `details` and `sql` are only present for execution failures.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

impl ErrorBody {
    /// Creates a body carrying only an error message.
    pub fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            sql: None,
        }
    }
}

impl From<AppError> for ErrorBody {
    fn from(err: AppError) -> Self {
        match err {
            AppError::ExecutionFailed { details, sql } => Self {
                error: "SQL Execution Failed".to_string(),
                details: Some(details),
                sql: Some(sql),
            },
            // Internal failures keep their detail in the logs only.
            AppError::ExternalService(_)
            | AppError::DatabaseConnection(_)
            | AppError::Config(_) => Self::message("Internal server error"),
            other => Self::message(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::debug!(error = %self, status = %status, "request failed");
        }
        (status, Json(ErrorBody::from(self))).into_response()
    }
}

//! Natural-language query models.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::{AppError, AppResult};

/// One result row: column name to value.
pub type JsonRow = serde_json::Map<String, serde_json::Value>;

/// Request body for `POST /query`.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NlQueryRequest {
    /// Natural-language question to translate into SQL.
    #[validate(
        required(message = "Missing natural query"),
        length(min = 1, message = "Missing natural query")
    )]
    pub nl_query: Option<String>,
}

impl NlQueryRequest {
    /// Returns the question, rejecting absent, empty and blank values.
    pub fn into_question(self) -> AppResult<String> {
        self.validate().map_err(|_| AppError::MissingQuery)?;
        self.nl_query
            .filter(|q| !q.trim().is_empty())
            .ok_or(AppError::MissingQuery)
    }
}

/// Successful response: the generated SQL and the rows it produced.
#[derive(Debug, Serialize, ToSchema)]
pub struct NlQueryResponse {
    pub sql: String,
    #[schema(value_type = Vec<Object>)]
    pub result: Vec<JsonRow>,
}

//! Schema prompt template.
//!
//! The schema description lives in `prompts/daily_job_automotive.txt` and is
//! embedded at build time. A deployment can point `PROMPT_TEMPLATE_PATH` at a
//! newer document without rebuilding.

use std::path::Path;
use std::sync::Arc;

use common::errors::{AppError, AppResult};

const EMBEDDED_TEMPLATE: &str = include_str!("../prompts/daily_job_automotive.txt");

/// Immutable schema document prepended to every question.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    schema: Arc<str>,
}

impl PromptTemplate {
    /// The template shipped with the binary.
    pub fn embedded() -> Self {
        Self::from_text(EMBEDDED_TEMPLATE)
    }

    /// Reads the template from `path`, or falls back to the embedded one.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let Some(path) = path else {
            return Ok(Self::embedded());
        };

        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read prompt template {}: {}", path.display(), e))
        })?;
        if text.trim().is_empty() {
            return Err(AppError::Config(format!(
                "prompt template {} is empty",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loaded prompt template");
        Ok(Self::from_text(&text))
    }

    fn from_text(text: &str) -> Self {
        Self {
            schema: Arc::from(text.trim_end()),
        }
    }

    /// Appends the user's question to the schema document.
    pub fn compose(&self, question: &str) -> String {
        format!("{}\n\nUser request: {}", self.schema, question)
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }
}

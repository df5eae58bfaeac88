//! Natural language to SQL generation through the Gemini API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use common::config::LlmConfig;
use common::errors::{AppError, AppResult};

use crate::prompt::PromptTemplate;

/// Turns a natural-language question into SQL text.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    /// Returns cleaned SQL, or `None` when no usable text came back.
    async fn generate_sql(&self, natural_language_query: &str) -> Option<String>;
}

/// [`SqlGenerator`] backed by Gemini `generateContent`.
pub struct GeminiSqlGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    prompt: PromptTemplate,
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiSqlGenerator {
    pub fn new(client: reqwest::Client, config: &LlmConfig, prompt: PromptTemplate) -> Self {
        Self {
            client,
            endpoint: config.endpoint(),
            api_key: config.api_key.clone(),
            prompt,
        }
    }

    /// Sends one completion request and returns the raw response body.
    async fn call_gemini(&self, prompt: &str) -> AppResult<String> {
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Gemini request failed: {}", e.without_url())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::ExternalService(format!("failed to read Gemini response: {}", e.without_url())))?;

        if !status.is_success() {
            return Err(AppError::ExternalService(format!(
                "Gemini API error {}: {}",
                status, body
            )));
        }
        Ok(body)
    }
}

#[async_trait]
impl SqlGenerator for GeminiSqlGenerator {
    async fn generate_sql(&self, natural_language_query: &str) -> Option<String> {
        let prompt = self.prompt.compose(natural_language_query);

        let body = match self.call_gemini(&prompt).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "SQL generation request failed");
                return None;
            }
        };

        let Some(text) = first_candidate_text(&body) else {
            tracing::warn!(response = %body, "Gemini returned no completion text");
            return None;
        };

        let sql = strip_code_fences(&text);
        if sql.is_empty() {
            tracing::warn!(response = %body, "Gemini completion was empty after cleanup");
            return None;
        }

        tracing::info!(sql = %sql, "Generated SQL");
        Some(sql)
    }
}

/// Text of `candidates[0].content.parts[0]`, if present and non-blank.
fn first_candidate_text(body: &str) -> Option<String> {
    let parsed: GenerateContentResponse = serde_json::from_str(body).ok()?;
    parsed
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .next()?
        .text
        .filter(|t| !t.trim().is_empty())
}

/// Removes Markdown code fences and surrounding whitespace.
///
/// An opening fence takes the rest of its line with it, so any language tag
/// (`sql`, `mysql`, ...) goes too. A fence closed on the same line keeps its
/// contents.
pub fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut inside = false;
    while let Some(start) = rest.find("```") {
        out.push_str(&rest[..start]);
        rest = &rest[start + 3..];
        if !inside {
            let line_end = rest.find('\n').unwrap_or(rest.len());
            if !rest[..line_end].contains("```") {
                rest = &rest[line_end..];
            }
        }
        inside = !inside;
    }
    out.push_str(rest);
    out.trim().to_string()
}

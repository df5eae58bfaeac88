//! In-memory generator and executor used by unit tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use common::errors::{AppError, AppResult};
use common::models::JsonRow;

use crate::executor::QueryExecutor;
use crate::generator::SqlGenerator;

pub enum GeneratorReply {
    Fixed(Option<String>),
    /// Builds SQL from the question after a short delay.
    Echo,
}

pub struct FakeGenerator {
    reply: GeneratorReply,
}

impl FakeGenerator {
    pub fn returning(sql: Option<&str>) -> Self {
        Self {
            reply: GeneratorReply::Fixed(sql.map(str::to_string)),
        }
    }

    pub fn echo() -> Self {
        Self {
            reply: GeneratorReply::Echo,
        }
    }
}

#[async_trait]
impl SqlGenerator for FakeGenerator {
    async fn generate_sql(&self, natural_language_query: &str) -> Option<String> {
        match &self.reply {
            GeneratorReply::Fixed(sql) => sql.clone(),
            GeneratorReply::Echo => {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Some(format!("SELECT '{}' AS question", natural_language_query))
            }
        }
    }
}

pub enum ExecutorReply {
    Rows(Vec<JsonRow>),
    Fail(String),
    /// Returns one row holding the executed statement.
    Echo,
}

pub struct FakeExecutor {
    reply: ExecutorReply,
    healthy: bool,
    ping_delay: Option<Duration>,
    executed: Mutex<Vec<String>>,
}

impl FakeExecutor {
    fn with_reply(reply: ExecutorReply) -> Self {
        Self {
            reply,
            healthy: true,
            ping_delay: None,
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Replies with `rows`; each value must be a JSON object.
    pub fn rows(rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| match row {
                Value::Object(map) => map,
                other => panic!("row must be an object, got {other}"),
            })
            .collect();
        Self::with_reply(ExecutorReply::Rows(rows))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_reply(ExecutorReply::Fail(message.to_string()))
    }

    pub fn echo() -> Self {
        Self::with_reply(ExecutorReply::Echo)
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// Makes `ping` hang for `delay` before answering.
    pub fn stalled_ping(mut self, delay: Duration) -> Self {
        self.ping_delay = Some(delay);
        self
    }

    /// Statements received so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for FakeExecutor {
    async fn execute(&self, sql: &str) -> AppResult<Vec<JsonRow>> {
        self.executed.lock().unwrap().push(sql.to_string());
        match &self.reply {
            ExecutorReply::Rows(rows) => Ok(rows.clone()),
            ExecutorReply::Fail(message) => Err(AppError::ExecutionFailed {
                details: message.clone(),
                sql: sql.to_string(),
            }),
            ExecutorReply::Echo => {
                tokio::time::sleep(Duration::from_millis(10)).await;
                let mut row = JsonRow::new();
                row.insert("executed".into(), Value::String(sql.to_string()));
                Ok(vec![row])
            }
        }
    }

    async fn ping(&self) -> AppResult<()> {
        if let Some(delay) = self.ping_delay {
            tokio::time::sleep(delay).await;
        }
        if self.healthy {
            Ok(())
        } else {
            Err(AppError::DatabaseConnection("connection refused".into()))
        }
    }
}

//! SQL execution against the shared MySQL pool.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, SecondsFormat};
use serde_json::Value;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

use common::config::DatabaseConfig;
use common::errors::{AppError, AppResult};
use common::models::JsonRow;

/// Runs SQL text and returns the produced rows.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Executes `sql` as-is.
    ///
    /// Failures are reported as [`AppError::ExecutionFailed`] carrying the
    /// driver message and the statement.
    async fn execute(&self, sql: &str) -> AppResult<Vec<JsonRow>>;

    /// Checks that the database is reachable.
    async fn ping(&self) -> AppResult<()>;
}

/// [`QueryExecutor`] over a process-wide MySQL pool.
pub struct MySqlExecutor {
    pool: MySqlPool,
}

impl MySqlExecutor {
    /// Builds the pool without opening a connection; connections are
    /// established on first use.
    pub fn connect_lazy(config: &DatabaseConfig) -> AppResult<Self> {
        let options = match &config.url {
            Some(url) => MySqlConnectOptions::from_str(url)
                .map_err(|e| AppError::Config(format!("invalid DATABASE_URL: {}", e)))?,
            None => MySqlConnectOptions::new()
                .host(&config.host)
                .port(config.port)
                .username(&config.username)
                .password(&config.password)
                .database(&config.database),
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_lazy_with(options);

        Ok(Self { pool })
    }

    /// Closes the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl QueryExecutor for MySqlExecutor {
    async fn execute(&self, sql: &str) -> AppResult<Vec<JsonRow>> {
        let rows = sqlx::raw_sql(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                let details = driver_message(&e);
                tracing::error!(sql = %sql, error = %details, "SQL execution failed");
                AppError::ExecutionFailed {
                    details,
                    sql: sql.to_string(),
                }
            })?;

        tracing::debug!(rows = rows.len(), "SQL executed");
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
        Ok(())
    }
}

/// The database's own message when there is one, else the driver error text.
fn driver_message(err: &sqlx::Error) -> String {
    match err.as_database_error() {
        Some(db_err) => db_err.message().to_string(),
        None => err.to_string(),
    }
}

fn row_to_json(row: &MySqlRow) -> JsonRow {
    row.columns()
        .iter()
        .map(|column| {
            let value = column_value(row, column.ordinal(), column.type_info().name());
            (column.name().to_string(), value)
        })
        .collect()
}

fn column_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(_) => return Value::Null,
    }

    // The text protocol sends every value as its textual form.
    let decoded = if is_binary(type_name) {
        row.try_get_unchecked::<Vec<u8>, _>(index).map(bytes_to_json)
    } else {
        row.try_get_unchecked::<String, _>(index)
            .map(|text| text_to_json(type_name, &text))
            .or_else(|_| row.try_get_unchecked::<Vec<u8>, _>(index).map(bytes_to_json))
    };

    decoded.unwrap_or_else(|e| {
        tracing::warn!(column = index, type_name, error = %e, "undecodable column value");
        Value::Null
    })
}

fn is_binary(type_name: &str) -> bool {
    matches!(
        type_name,
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" | "GEOMETRY"
    )
}

/// Converts the text form of a non-null column value to JSON.
///
/// Values that do not parse as their column type (zero dates, TIME outside
/// a day) are returned as the text the server sent.
fn text_to_json(type_name: &str, text: &str) -> Value {
    let parsed = match type_name {
        "BOOLEAN" => match text {
            "0" => Some(Value::Bool(false)),
            "1" => Some(Value::Bool(true)),
            _ => text.parse::<i64>().ok().map(Value::from),
        },
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            text.parse::<i64>().ok().map(Value::from)
        }
        name if name.ends_with(" UNSIGNED") => text.parse::<u64>().ok().map(Value::from),
        "FLOAT" | "DOUBLE" => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        "DATE" => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .map(|d| Value::String(d.to_string())),
        "DATETIME" | "TIMESTAMP" => NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .map(|dt| Value::String(dt.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true))),
        "JSON" => serde_json::from_str(text).ok(),
        // DECIMAL stays textual to keep its precision.
        _ => None,
    };

    parsed.unwrap_or_else(|| Value::String(text.to_string()))
}

fn bytes_to_json(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(text) => Value::String(text),
        Err(e) => Value::from(e.into_bytes()),
    }
}

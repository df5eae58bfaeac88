//! Handler模块

use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use common::errors::{AppError, ErrorBody};
use common::models::{NlQueryRequest, NlQueryResponse};
use crate::service::Text2SqlService;
use crate::state::AppState;

/// 自然语言查询：生成 SQL 并执行
#[utoipa::path(
    post,
    path = "/query",
    tag = "query",
    request_body = NlQueryRequest,
    responses(
        (status = 200, description = "生成的 SQL 与查询结果", body = NlQueryResponse),
        (status = 400, description = "缺少自然语言问题", body = ErrorBody),
        (status = 500, description = "SQL 生成失败或执行失败", body = ErrorBody)
    )
)]
pub async fn nl_query(
    State(state): State<AppState>,
    payload: Result<Json<NlQueryRequest>, JsonRejection>,
) -> Result<Json<NlQueryResponse>, AppError> {
    let question = match payload {
        Ok(Json(req)) => req.into_question()?,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "unreadable request body");
            return Err(AppError::MissingQuery);
        }
    };

    let service = Text2SqlService::new(state.generator.clone(), state.executor.clone());
    let response = service.answer(&question).await?;
    Ok(Json(response))
}

/// Upper bound on the database check in `/api/health`.
const HEALTH_PING_TIMEOUT: Duration = Duration::from_secs(2);

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行状态", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match tokio::time::timeout(HEALTH_PING_TIMEOUT, state.executor.ping()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "database health check failed");
            false
        }
        Err(_) => {
            tracing::warn!(timeout = ?HEALTH_PING_TIMEOUT, "database health check timed out");
            false
        }
    };

    Json(HealthResponse {
        status: if database { "healthy" } else { "degraded" }.to_string(),
        service: "ai-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        database,
    })
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    /// Whether `SELECT 1` succeeded through the pool.
    pub database: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::routes;
    use crate::testing::{FakeExecutor, FakeGenerator};

    fn app(generator: FakeGenerator, executor: Arc<FakeExecutor>) -> Router {
        routes::router().with_state(AppState::new(Arc::new(generator), executor))
    }

    async fn post_query(app: Router, body: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_missing_query_is_rejected_before_generation() {
        for body in [
            "{}",
            r#"{"nlQuery":""}"#,
            r#"{"nlQuery":null}"#,
            r#"{"nlQuery":42}"#,
            "not json",
        ] {
            let executor = Arc::new(FakeExecutor::rows(vec![]));
            let (status, json) = post_query(
                app(FakeGenerator::returning(Some("SELECT 1")), executor.clone()),
                body,
            )
            .await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(json, json!({ "error": "Missing natural query" }));
            assert!(executor.executed().is_empty());
        }
    }

    #[tokio::test]
    async fn test_generation_failure_never_executes() {
        let executor = Arc::new(FakeExecutor::rows(vec![json!({ "n": 1 })]));
        let (status, json) = post_query(
            app(FakeGenerator::returning(None), executor.clone()),
            r#"{"nlQuery":"how many vehicles?"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json, json!({ "error": "AI failed to generate SQL" }));
        assert!(executor.executed().is_empty());
    }

    #[tokio::test]
    async fn test_success_returns_sql_and_rows_unmodified() {
        let rows = vec![
            json!({ "registration_no": "KA01AB1234", "open_jobs": 2, "last_visit": null }),
            json!({ "registration_no": "MH12XY9876", "open_jobs": 1, "last_visit": "2026-10-15" }),
        ];
        let sql = "SELECT v.registration_no, COUNT(*) AS open_jobs FROM vehicles v JOIN job_cards j USING (vehicle_id) GROUP BY v.registration_no";
        let executor = Arc::new(FakeExecutor::rows(rows.clone()));

        let (status, json) = post_query(
            app(FakeGenerator::returning(Some(sql)), executor.clone()),
            r#"{"nlQuery":"open jobs per vehicle"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "sql": sql, "result": rows }));
        assert_eq!(executor.executed(), vec![sql.to_string()]);
    }

    #[tokio::test]
    async fn test_execution_failure_reports_sql_and_driver_message() {
        let message = "Unknown column 'plate' in 'field list'";
        let (status, json) = post_query(
            app(
                FakeGenerator::returning(Some("SELECT plate FROM vehicles")),
                Arc::new(FakeExecutor::failing(message)),
            ),
            r#"{"nlQuery":"list plates"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json,
            json!({
                "error": "SQL Execution Failed",
                "details": message,
                "sql": "SELECT plate FROM vehicles"
            })
        );
    }

    #[tokio::test]
    async fn test_concurrent_requests_do_not_mix() {
        let app = app(FakeGenerator::echo(), Arc::new(FakeExecutor::echo()));

        let (first, second) = tokio::join!(
            post_query(app.clone(), r#"{"nlQuery":"first question"}"#),
            post_query(app.clone(), r#"{"nlQuery":"second question"}"#),
        );

        for ((status, json), question) in [(first, "first question"), (second, "second question")] {
            let expected = format!("SELECT '{question}' AS question");
            assert_eq!(status, StatusCode::OK);
            assert_eq!(json["sql"], json!(expected));
            assert_eq!(json["result"], json!([{ "executed": expected }]));
        }
    }

    #[tokio::test]
    async fn test_health_reports_database_state() {
        for (executor, status, database) in [
            (FakeExecutor::rows(vec![]), "healthy", true),
            (FakeExecutor::rows(vec![]).unhealthy(), "degraded", false),
        ] {
            let response = app(FakeGenerator::returning(None), Arc::new(executor))
                .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);

            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let json: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(json["status"], json!(status));
            assert_eq!(json["database"], json!(database));
            assert_eq!(json["service"], json!("ai-service"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_does_not_wait_for_stalled_database() {
        let executor = FakeExecutor::rows(vec![]).stalled_ping(Duration::from_secs(30));
        let started = tokio::time::Instant::now();

        let response = app(FakeGenerator::returning(None), Arc::new(executor))
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(started.elapsed() < Duration::from_secs(30));

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], json!("degraded"));
        assert_eq!(json["database"], json!(false));
    }
}

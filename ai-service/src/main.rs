//! AI 智能查询服务
//!
//! 提供 Text2SQL 功能，包括：
//! - 基于固定 schema 提示词，调用 Gemini 将自然语言转换为 SQL
//! - 在共享 MySQL 连接池上执行生成的 SQL
//! - 同时返回生成的 SQL 与查询结果

mod executor;
mod generator;
mod handlers;
mod prompt;
mod routes;
mod service;
mod state;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::Context;
use axum::{middleware, routing::get, Json, Router};
use common::config::{self, AppConfig};
use common::middleware::request_id::request_id_middleware;
use executor::MySqlExecutor;
use generator::GeminiSqlGenerator;
use prompt::PromptTemplate;
use state::AppState;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "ai-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "AI 查询服务 API",
        version = "0.1.0",
        description = "Text2SQL 微服务：自然语言生成 SQL 并执行"
    ),
    paths(
        handlers::nl_query,
        handlers::health_check,
    ),
    components(schemas(
        common::models::NlQueryRequest,
        common::models::NlQueryResponse,
        common::errors::ErrorBody,
        handlers::HealthResponse,
    )),
    tags(
        (name = "query", description = "自然语言查询端点"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 优先加载 .env 文件
    config::load_dotenv();

    // 初始化日志追踪
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // 加载配置
    let config = AppConfig::load_with_service(SERVICE_NAME).context("加载配置失败")?;

    let prompt = PromptTemplate::load(config.prompt_path.as_deref()).context("加载提示词模板失败")?;
    info!(prompt_chars = prompt.schema().len(), "提示词模板已就绪");
    let generator = GeminiSqlGenerator::new(reqwest::Client::new(), &config.llm, prompt);

    // 连接池在首次查询时才建立连接
    let executor = Arc::new(MySqlExecutor::connect_lazy(&config.database).context("创建数据库连接池失败")?);
    info!(
        host = %config.database.host,
        database = %config.database.database,
        model = %config.llm.model,
        "依赖初始化完成"
    );

    // 创建应用状态与路由
    let state = AppState::new(Arc::new(generator), executor.clone());
    let app = create_router(state);

    // 启动服务
    let addr = config.bind_addr();
    info!(service = SERVICE_NAME, address = %addr, "启动服务");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("绑定地址失败: {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务运行失败")?;

    info!("正在关闭数据库连接池");
    executor.close().await;
    info!("服务已停止");
    Ok(())
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "无法监听 Ctrl+C 信号");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "无法监听 SIGTERM 信号");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("收到关闭信号");
}

//! Text2SQL 编排服务模块

use std::sync::Arc;

use common::errors::{AppError, AppResult};
use common::models::NlQueryResponse;

use crate::executor::QueryExecutor;
use crate::generator::SqlGenerator;

/// 自然语言查询服务：先生成 SQL，再执行
pub struct Text2SqlService {
    generator: Arc<dyn SqlGenerator>,
    executor: Arc<dyn QueryExecutor>,
}

impl Text2SqlService {
    /// 创建新的服务实例
    pub fn new(generator: Arc<dyn SqlGenerator>, executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            generator,
            executor,
        }
    }

    /// 回答一个自然语言问题
    ///
    /// The executor is only reached once the generator produced non-blank SQL.
    pub async fn answer(&self, question: &str) -> AppResult<NlQueryResponse> {
        let sql = self
            .generator
            .generate_sql(question)
            .await
            .filter(|sql| !sql.trim().is_empty())
            .ok_or(AppError::GenerationFailed)?;

        let result = self.executor.execute(&sql).await?;
        tracing::info!(rows = result.len(), "Query answered");

        Ok(NlQueryResponse { sql, result })
    }
}

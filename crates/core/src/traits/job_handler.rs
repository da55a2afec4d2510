//! 任务处理器接口定义
//!
//! 处理器是外部协作方（集成同步、报表生成、健康检查等）提供的单方法能力：
//! 接收可取消的执行上下文和参数表，返回结构化结果或错误。
//!
//! ## 取消语义
//!
//! 每次尝试都有独立的超时。超时后Worker会丢弃处理器的future并取消
//! [`JobContext`] 中的令牌。处理器如果把工作派生到其他任务或阻塞线程，
//! 应当定期检查 [`JobContext::is_cancelled`] 或等待 [`JobContext::cancelled`]。
//!
//! ## 使用示例
//!
//! ```rust
//! use async_trait::async_trait;
//! use jobs_core::models::{JobParams, JobResult};
//! use jobs_core::traits::{JobContext, JobHandler};
//! use jobs_core::SchedulerResult;
//!
//! pub struct AnalyticsAggregation;
//!
//! #[async_trait]
//! impl JobHandler for AnalyticsAggregation {
//!     async fn execute(&self, ctx: JobContext, _params: &JobParams) -> SchedulerResult<JobResult> {
//!         if ctx.is_cancelled() {
//!             return Ok(JobResult::failure("cancelled"));
//!         }
//!         Ok(JobResult::success(JobParams::new())
//!             .with_data("events_aggregated", serde_json::json!(5000)))
//!     }
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::models::{JobParams, JobResult};
use crate::SchedulerResult;

/// 单次尝试的执行上下文
#[derive(Debug, Clone)]
pub struct JobContext {
    pub execution_id: String,
    pub job_id: String,
    /// 当前尝试序号，从1开始
    pub attempt: u32,
    pub worker_id: String,
    /// 本次尝试的截止时间
    pub deadline: DateTime<Utc>,
    /// 超时时被取消
    pub cancellation_token: CancellationToken,
}

impl JobContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// 等待取消信号
    pub async fn cancelled(&self) {
        self.cancellation_token.cancelled().await
    }
}

/// 任务处理器
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn execute(&self, ctx: JobContext, params: &JobParams) -> SchedulerResult<JobResult>;
}

/// 把异步闭包适配为 [`JobHandler`]
pub struct FnJobHandler<F> {
    func: F,
}

#[async_trait]
impl<F, Fut> JobHandler for FnJobHandler<F>
where
    F: Fn(JobContext, JobParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SchedulerResult<JobResult>> + Send + 'static,
{
    async fn execute(&self, ctx: JobContext, params: &JobParams) -> SchedulerResult<JobResult> {
        (self.func)(ctx, params.clone()).await
    }
}

/// 用闭包创建处理器
pub fn handler_fn<F, Fut>(func: F) -> Arc<dyn JobHandler>
where
    F: Fn(JobContext, JobParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SchedulerResult<JobResult>> + Send + 'static,
{
    Arc::new(FnJobHandler { func })
}

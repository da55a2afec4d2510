//! 内置任务
//!
//! - `echo`：原样返回参数，用于冒烟测试和临时提交演示
//! - `heartbeat`：报告Worker和主机信息的健康检查

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jobs_core::models::{JobDefinition, JobParams, JobResult};
use jobs_core::traits::{JobContext, JobHandler};
use jobs_core::SchedulerResult;
use serde_json::json;
use tracing::debug;

use crate::manager::JobManager;

pub const ECHO_JOB_ID: &str = "echo";
pub const HEARTBEAT_JOB_ID: &str = "heartbeat";

/// 原样返回参数
pub struct EchoJob;

#[async_trait]
impl JobHandler for EchoJob {
    async fn execute(&self, ctx: JobContext, params: &JobParams) -> SchedulerResult<JobResult> {
        debug!("echo任务 {} 第 {} 次尝试", ctx.execution_id, ctx.attempt);
        Ok(JobResult::success(params.clone()).with_metadata("attempt", json!(ctx.attempt)))
    }
}

/// 健康检查
pub struct HeartbeatJob {
    hostname: String,
}

impl HeartbeatJob {
    pub fn new() -> Self {
        let hostname = hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());
        Self { hostname }
    }
}

impl Default for HeartbeatJob {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobHandler for HeartbeatJob {
    async fn execute(&self, ctx: JobContext, _params: &JobParams) -> SchedulerResult<JobResult> {
        Ok(JobResult::success(JobParams::new())
            .with_data("status", json!("healthy"))
            .with_data("hostname", json!(self.hostname))
            .with_data("worker_id", json!(ctx.worker_id))
            .with_data("checked_at", json!(Utc::now().to_rfc3339())))
    }
}

pub fn echo_job() -> JobDefinition {
    JobDefinition::new(ECHO_JOB_ID, "Echo", Arc::new(EchoJob))
        .with_description("原样返回参数")
        .with_timeout(Duration::from_secs(30))
        .with_max_retries(0)
}

pub fn heartbeat_job() -> JobDefinition {
    JobDefinition::new(HEARTBEAT_JOB_ID, "System Heartbeat", Arc::new(HeartbeatJob::new()))
        .with_type("health_check")
        .with_description("报告进程所在主机和Worker的健康状态")
        .with_timeout(Duration::from_secs(60))
        .with_max_retries(1)
        .with_retry_delay(Duration::from_secs(10))
}

/// 注册所有内置任务
pub async fn register_builtin_jobs(manager: &JobManager) -> SchedulerResult<()> {
    manager.register_job(echo_job()).await?;
    manager.register_job(heartbeat_job()).await?;
    Ok(())
}

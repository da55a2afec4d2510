//! 任务生命周期的结构化事件日志
//!
//! 每个事件都带有 `event` 字段，便于在 JSON 日志中过滤。

use std::time::Duration;

use chrono::{DateTime, Utc};
use jobs_core::models::{Execution, ExecutionSource};
use tracing::{debug, error, info, warn};

pub struct StructuredLogger;

impl StructuredLogger {
    pub fn log_job_registered(job_id: &str, name: &str, job_type: &str, max_retries: u32) {
        info!(
            event = "job_registered",
            job.id = job_id,
            job.name = name,
            job.type = job_type,
            job.max_retries = max_retries,
            "任务已注册"
        );
    }

    pub fn log_schedule_created(
        schedule_id: &str,
        job_id: &str,
        expression: &str,
        next_run: DateTime<Utc>,
    ) {
        info!(
            event = "schedule_created",
            schedule.id = schedule_id,
            job.id = job_id,
            schedule.expression = expression,
            schedule.next_run = %next_run,
            "调度条目已创建"
        );
    }

    pub fn log_schedule_toggled(schedule_id: &str, enabled: bool) {
        info!(
            event = "schedule_toggled",
            schedule.id = schedule_id,
            schedule.enabled = enabled,
            "调度条目状态已更新"
        );
    }

    pub fn log_execution_queued(execution: &Execution) {
        let schedule_id = match &execution.source {
            ExecutionSource::Scheduled { schedule_id } => schedule_id.as_str(),
            ExecutionSource::Manual => "",
        };
        debug!(
            event = "execution_queued",
            execution.id = %execution.id,
            job.id = %execution.job_id,
            schedule.id = schedule_id,
            "执行实例已入队"
        );
    }

    pub fn log_execution_started(execution: &Execution, worker_id: &str, attempt: u32) {
        info!(
            event = "execution_started",
            execution.id = %execution.id,
            job.id = %execution.job_id,
            worker.id = worker_id,
            attempt = attempt,
            "开始执行任务"
        );
    }

    pub fn log_execution_completed(execution: &Execution, duration: Duration) {
        info!(
            event = "execution_completed",
            execution.id = %execution.id,
            job.id = %execution.job_id,
            attempts = execution.attempts,
            duration_ms = duration.as_millis() as u64,
            "任务执行成功"
        );
    }

    pub fn log_execution_retrying(execution: &Execution, error: &str, retry_delay: Duration) {
        warn!(
            event = "execution_retrying",
            execution.id = %execution.id,
            job.id = %execution.job_id,
            attempt = execution.attempts,
            retry_delay_ms = retry_delay.as_millis() as u64,
            error = error,
            "任务执行失败，等待重试"
        );
    }

    pub fn log_execution_failed(execution: &Execution, error: &str) {
        error!(
            event = "execution_failed",
            execution.id = %execution.id,
            job.id = %execution.job_id,
            attempts = execution.attempts,
            error = error,
            "任务执行最终失败"
        );
    }

    pub fn log_execution_cancelled(execution: &Execution, reason: &str) {
        warn!(
            event = "execution_cancelled",
            execution.id = %execution.id,
            job.id = %execution.job_id,
            reason = reason,
            "执行实例已取消"
        );
    }

    pub fn log_fire_dropped(schedule_id: &str, job_id: &str, capacity: usize) {
        warn!(
            event = "fire_dropped",
            schedule.id = schedule_id,
            job.id = job_id,
            queue.capacity = capacity,
            "执行队列已满，本次调度触发被丢弃"
        );
    }

    pub fn log_retry_dropped(execution: &Execution, capacity: usize) {
        error!(
            event = "retry_dropped",
            execution.id = %execution.id,
            job.id = %execution.job_id,
            attempt = execution.attempts,
            queue.capacity = capacity,
            "执行队列已满，重试被丢弃"
        );
    }
}

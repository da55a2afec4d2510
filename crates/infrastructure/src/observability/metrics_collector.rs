//! 任务指标收集
//!
//! 计数同时写入两处：进程内原子计数器（供 `get_stats` 快照读取）以及
//! `metrics` 门面（安装了 Prometheus 记录器时对外导出，否则为空操作）。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use serde::Serialize;

const EXECUTIONS_QUEUED: &str = "jobs_executions_queued_total";
const EXECUTIONS_COMPLETED: &str = "jobs_executions_completed_total";
const EXECUTIONS_FAILED: &str = "jobs_executions_failed_total";
const EXECUTIONS_CANCELLED: &str = "jobs_executions_cancelled_total";
const EXECUTION_RETRIES: &str = "jobs_execution_retries_total";
const ATTEMPT_FAILURES: &str = "jobs_attempt_failures_total";
const EXECUTION_TIMEOUTS: &str = "jobs_execution_timeouts_total";
const EXECUTION_DURATION: &str = "jobs_execution_duration_seconds";
const DROPPED_FIRES: &str = "jobs_schedule_fires_dropped_total";
const DROPPED_RETRIES: &str = "jobs_retries_dropped_total";
const QUEUE_DEPTH: &str = "jobs_queue_depth";
const BUSY_WORKERS: &str = "jobs_busy_workers";

/// 注册指标描述，仅在安装记录器后调用
pub(crate) fn describe_metrics() {
    describe_counter!(EXECUTIONS_QUEUED, "进入执行队列的执行实例数");
    describe_counter!(EXECUTIONS_COMPLETED, "成功完成的执行实例数");
    describe_counter!(EXECUTIONS_FAILED, "最终失败的执行实例数");
    describe_counter!(EXECUTIONS_CANCELLED, "被取消的执行实例数");
    describe_counter!(EXECUTION_RETRIES, "安排的重试次数");
    describe_counter!(ATTEMPT_FAILURES, "失败的尝试次数（含超时）");
    describe_counter!(EXECUTION_TIMEOUTS, "超时的尝试次数");
    describe_histogram!(EXECUTION_DURATION, "单次尝试的执行时长");
    describe_counter!(DROPPED_FIRES, "因队列已满被丢弃的调度触发");
    describe_counter!(DROPPED_RETRIES, "因队列已满被丢弃的重试");
    describe_gauge!(QUEUE_DEPTH, "当前排队中的执行实例数");
    describe_gauge!(BUSY_WORKERS, "正在执行任务的Worker数");
}

/// 任务指标收集器
#[derive(Debug, Default)]
pub struct JobMetrics {
    queued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    retries: AtomicU64,
    timeouts: AtomicU64,
    dropped_fires: AtomicU64,
    dropped_retries: AtomicU64,
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct JobMetricsSnapshot {
    pub queued: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub retries: u64,
    pub timeouts: u64,
    pub dropped_fires: u64,
    pub dropped_retries: u64,
}

impl JobMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_queued(&self, job_id: &str) {
        self.queued.fetch_add(1, Ordering::Relaxed);
        counter!(EXECUTIONS_QUEUED, "job_id" => job_id.to_string()).increment(1);
    }

    pub fn record_completed(&self, job_id: &str, duration: Duration) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        counter!(EXECUTIONS_COMPLETED, "job_id" => job_id.to_string()).increment(1);
        histogram!(EXECUTION_DURATION, "job_id" => job_id.to_string(), "outcome" => "success")
            .record(duration.as_secs_f64());
    }

    /// 记录一次失败的尝试（无论之后是否重试）
    pub fn record_attempt_failed(&self, job_id: &str, duration: Duration) {
        counter!(ATTEMPT_FAILURES, "job_id" => job_id.to_string()).increment(1);
        histogram!(EXECUTION_DURATION, "job_id" => job_id.to_string(), "outcome" => "failure")
            .record(duration.as_secs_f64());
    }

    pub fn record_failed(&self, job_id: &str) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        counter!(EXECUTIONS_FAILED, "job_id" => job_id.to_string()).increment(1);
    }

    pub fn record_cancelled(&self, job_id: &str) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
        counter!(EXECUTIONS_CANCELLED, "job_id" => job_id.to_string()).increment(1);
    }

    pub fn record_retry(&self, job_id: &str) {
        self.retries.fetch_add(1, Ordering::Relaxed);
        counter!(EXECUTION_RETRIES, "job_id" => job_id.to_string()).increment(1);
    }

    pub fn record_timeout(&self, job_id: &str) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
        counter!(EXECUTION_TIMEOUTS, "job_id" => job_id.to_string()).increment(1);
    }

    pub fn record_dropped_fire(&self, job_id: &str) {
        self.dropped_fires.fetch_add(1, Ordering::Relaxed);
        counter!(DROPPED_FIRES, "job_id" => job_id.to_string()).increment(1);
    }

    pub fn record_dropped_retry(&self, job_id: &str) {
        self.dropped_retries.fetch_add(1, Ordering::Relaxed);
        counter!(DROPPED_RETRIES, "job_id" => job_id.to_string()).increment(1);
    }

    pub fn update_queue_depth(&self, depth: usize) {
        gauge!(QUEUE_DEPTH).set(depth as f64);
    }

    pub fn update_busy_workers(&self, busy: usize) {
        gauge!(BUSY_WORKERS).set(busy as f64);
    }

    pub fn snapshot(&self) -> JobMetricsSnapshot {
        JobMetricsSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            dropped_fires: self.dropped_fires.load(Ordering::Relaxed),
            dropped_retries: self.dropped_retries.load(Ordering::Relaxed),
        }
    }
}

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::JobParams;

/// 执行实例状态
///
/// ```text
/// Pending -> Running -> Completed
///                    -> Failed
///                    -> Retrying -> Pending
/// Pending -> Cancelled
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Retrying,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Retrying => "retrying",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 执行实例的来源
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExecutionSource {
    Manual,
    Scheduled { schedule_id: String },
}

/// 任务处理结果
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobResult {
    pub success: bool,
    #[serde(default)]
    pub data: JobParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// 由Worker测量的实际执行时长
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "JobParams::is_empty")]
    pub metadata: JobParams,
}

impl JobResult {
    pub fn success(data: JobParams) -> Self {
        Self {
            success: true,
            data,
            ..Default::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// 任务执行实例
///
/// 表示一个任务定义的一次执行谱系（包含所有重试）。执行中的实例只由
/// 当前处理它的Worker持有和修改，进入终态后不再变化。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub job_id: String,
    pub status: ExecutionStatus,
    pub parameters: JobParams,
    pub source: ExecutionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub worker_id: Option<String>,
}

impl Execution {
    pub fn new(job_id: impl Into<String>, parameters: JobParams, source: ExecutionSource) -> Self {
        Self {
            id: format!("exec_{}", Uuid::new_v4().simple()),
            job_id: job_id.into(),
            status: ExecutionStatus::Pending,
            parameters,
            source,
            result: None,
            last_error: None,
            queued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            attempts: 0,
            worker_id: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 开始一次新的尝试，返回本次的尝试序号
    pub fn mark_running(&mut self, worker_id: &str) -> u32 {
        debug_assert!(!self.is_terminal());
        self.status = ExecutionStatus::Running;
        self.worker_id = Some(worker_id.to_string());
        self.attempts += 1;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.attempts
    }

    pub fn mark_completed(&mut self, result: JobResult) {
        if self.is_terminal() {
            return;
        }
        self.status = ExecutionStatus::Completed;
        self.result = Some(result);
        self.finish();
    }

    pub fn mark_retrying(&mut self, error: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = ExecutionStatus::Retrying;
        self.last_error = Some(error.into());
    }

    /// 重试等待结束，重新进入队列
    pub fn mark_pending(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.status = ExecutionStatus::Pending;
        self.queued_at = Utc::now();
    }

    pub fn mark_failed(&mut self, error: impl Into<String>, result: Option<JobResult>) {
        if self.is_terminal() {
            return;
        }
        self.status = ExecutionStatus::Failed;
        self.last_error = Some(error.into());
        self.result = result;
        self.finish();
    }

    pub fn mark_cancelled(&mut self, reason: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = ExecutionStatus::Cancelled;
        self.last_error = Some(reason.into());
        self.finish();
    }

    fn finish(&mut self) {
        if self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
    }
}

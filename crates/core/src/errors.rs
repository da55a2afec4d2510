use thiserror::Error;

/// 任务调度子系统错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("任务未找到: {id}")]
    JobNotFound { id: String },

    #[error("任务已注册: {id}")]
    DuplicateJob { id: String },

    #[error("无效的调度表达式: {expr} - {message}")]
    InvalidSchedule { expr: String, message: String },

    #[error("任务队列已满 (容量: {capacity})")]
    QueueFull { capacity: usize },

    #[error("任务处理器错误: {0}")]
    HandlerError(String),

    #[error("任务执行超时 ({timeout_ms}ms)")]
    ExecutionTimeout { timeout_ms: u64 },

    #[error("任务执行实例未找到: {id}")]
    ExecutionNotFound { id: String },

    #[error("调度条目未找到: {id}")]
    ScheduleNotFound { id: String },

    #[error("调度条目已禁用: {id}")]
    ScheduleDisabled { id: String },

    #[error("任务管理器已停止")]
    ManagerStopped,

    #[error("序列化错误: {0}")]
    Serialization(String),
}

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

impl SchedulerError {
    pub fn job_not_found<S: Into<String>>(id: S) -> Self {
        Self::JobNotFound { id: id.into() }
    }

    pub fn execution_not_found<S: Into<String>>(id: S) -> Self {
        Self::ExecutionNotFound { id: id.into() }
    }

    pub fn schedule_not_found<S: Into<String>>(id: S) -> Self {
        Self::ScheduleNotFound { id: id.into() }
    }

    pub fn invalid_schedule<E: Into<String>, M: Into<String>>(expr: E, message: M) -> Self {
        Self::InvalidSchedule {
            expr: expr.into(),
            message: message.into(),
        }
    }

    /// 处理器返回的业务错误
    pub fn handler<S: Into<String>>(msg: S) -> Self {
        Self::HandlerError(msg.into())
    }

    /// 调用方错误：立即返回给调用者，不参与重试
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            SchedulerError::JobNotFound { .. }
                | SchedulerError::DuplicateJob { .. }
                | SchedulerError::InvalidSchedule { .. }
                | SchedulerError::ScheduleNotFound { .. }
                | SchedulerError::ScheduleDisabled { .. }
        )
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}

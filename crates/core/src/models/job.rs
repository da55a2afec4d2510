use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::traits::JobHandler;

/// 任务参数：字符串键到任意JSON值
pub type JobParams = std::collections::HashMap<String, serde_json::Value>;

pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

/// 任务定义
///
/// 注册后不可变，在整个进程生命周期内有效。处理器对管理器是不透明的，
/// 管理器只负责按超时和重试策略调用它。
#[derive(Clone, Serialize)]
pub struct JobDefinition {
    pub id: String,
    pub name: String,
    pub job_type: String,
    pub description: String,
    #[serde(skip)]
    pub handler: Arc<dyn JobHandler>,
    /// 单次尝试的最长执行时间
    pub timeout: Duration,
    /// 首次失败后允许的额外尝试次数
    pub max_retries: u32,
    /// 重新提交前的固定等待时间
    pub retry_delay: Duration,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, handler: Arc<dyn JobHandler>) -> Self {
        let id = id.into();
        let now = Utc::now();
        Self {
            job_type: id.clone(),
            id,
            name: name.into(),
            description: String::new(),
            handler,
            timeout: DEFAULT_JOB_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_type(mut self, job_type: impl Into<String>) -> Self {
        self.job_type = job_type.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// 单个执行实例允许的总尝试次数
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl fmt::Debug for JobDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("job_type", &self.job_type)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobResult;
    use crate::traits::handler_fn;

    #[test]
    fn test_job_definition_builder() {
        let handler = handler_fn(|_ctx, _params| async { Ok(JobResult::default()) });
        let def = JobDefinition::new("data_cleanup", "Data Cleanup", handler)
            .with_type("maintenance")
            .with_description("清理过期日志和临时数据")
            .with_timeout(Duration::from_secs(30 * 60))
            .with_max_retries(2)
            .with_retry_delay(Duration::from_secs(600));

        assert_eq!(def.id, "data_cleanup");
        assert_eq!(def.job_type, "maintenance");
        assert_eq!(def.max_retries, 2);
        assert_eq!(def.max_attempts(), 3);
        assert_eq!(def.timeout, Duration::from_secs(1800));
    }

    #[test]
    fn test_job_definition_defaults() {
        let handler = handler_fn(|_ctx, _params| async { Ok(JobResult::default()) });
        let def = JobDefinition::new("health_check", "System Health Check", handler);

        assert_eq!(def.job_type, "health_check");
        assert_eq!(def.timeout, DEFAULT_JOB_TIMEOUT);
        assert_eq!(def.max_attempts(), DEFAULT_MAX_RETRIES + 1);

        let json = serde_json::to_value(&def).unwrap();
        assert!(json.get("handler").is_none());
        assert_eq!(json["name"], "System Health Check");
    }
}

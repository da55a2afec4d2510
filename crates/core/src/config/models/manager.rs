use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 任务管理器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ManagerConfig {
    /// Worker数量
    pub worker_count: usize,
    /// 执行队列容量，满时入队立即失败
    pub queue_capacity: usize,
    /// 调度循环的检查间隔（秒）
    pub tick_interval_seconds: u64,
    /// 保留的执行记录上限
    pub execution_history_limit: usize,
    /// 停止时等待Worker退出的最长时间（秒）
    pub shutdown_timeout_seconds: u64,
    /// Worker标识前缀，最终形如 `{prefix}-1`
    pub worker_id_prefix: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            worker_count: 5,
            queue_capacity: 1000,
            tick_interval_seconds: 60,
            execution_history_limit: 10_000,
            shutdown_timeout_seconds: 30,
            worker_id_prefix: "worker".to_string(),
        }
    }
}

impl ManagerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.worker_count == 0 {
            return Err(anyhow::anyhow!("Worker数量必须大于0"));
        }

        if self.queue_capacity == 0 {
            return Err(anyhow::anyhow!("队列容量必须大于0"));
        }

        if self.tick_interval_seconds == 0 {
            return Err(anyhow::anyhow!("调度间隔必须大于0"));
        }

        if self.execution_history_limit == 0 {
            return Err(anyhow::anyhow!("执行记录上限必须大于0"));
        }

        if self.worker_id_prefix.trim().is_empty() {
            return Err(anyhow::anyhow!("Worker标识前缀不能为空"));
        }

        Ok(())
    }
}

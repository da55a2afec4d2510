use serde::{Deserialize, Serialize};

use crate::models::JobParams;

fn default_enabled() -> bool {
    true
}

/// 配置文件中声明的调度条目
///
/// 调度表达式在应用到管理器时才解析，无法识别的表达式会被拒绝。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleConfig {
    pub job_id: String,
    pub name: String,
    pub schedule: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub parameters: JobParams,
}

impl ScheduleConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.job_id.trim().is_empty() {
            return Err(anyhow::anyhow!("调度条目的任务ID不能为空"));
        }

        if self.name.trim().is_empty() {
            return Err(anyhow::anyhow!("调度条目名称不能为空: {}", self.job_id));
        }

        if self.schedule.trim().is_empty() {
            return Err(anyhow::anyhow!("调度表达式不能为空: {}", self.name));
        }

        Ok(())
    }
}

use std::sync::Arc;

use anyhow::{Context, Result};
use jobs_core::AppConfig;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::builtin_jobs::register_builtin_jobs;
use crate::manager::JobManager;

/// 主应用程序
///
/// 持有任务管理器，启动时注册内置任务并应用配置文件中声明的调度条目。
pub struct Application {
    config: AppConfig,
    manager: Arc<JobManager>,
}

impl Application {
    /// 创建新的应用实例
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!(
            "初始化应用程序: {} 个Worker，队列容量 {}",
            config.manager.worker_count, config.manager.queue_capacity
        );

        let manager = Arc::new(JobManager::new(config.manager.clone()));
        register_builtin_jobs(&manager)
            .await
            .context("注册内置任务失败")?;

        let app = Self { config, manager };
        let applied = app.apply_schedules().await;
        info!("已应用 {} 个配置的调度条目", applied);

        Ok(app)
    }

    pub fn manager(&self) -> Arc<JobManager> {
        Arc::clone(&self.manager)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 无效的调度条目记录警告后跳过，不影响其它条目
    async fn apply_schedules(&self) -> usize {
        let mut applied = 0;
        for schedule in &self.config.schedules {
            let schedule_id = match self
                .manager
                .schedule_job(
                    &schedule.job_id,
                    &schedule.name,
                    &schedule.schedule,
                    schedule.parameters.clone(),
                )
                .await
            {
                Ok(id) => id,
                Err(e) if e.is_caller_error() => {
                    warn!("跳过调度条目 {}: {}", schedule.name, e);
                    continue;
                }
                Err(e) => {
                    error!("应用调度条目 {} 失败: {}", schedule.name, e);
                    continue;
                }
            };

            if !schedule.enabled {
                if let Err(e) = self.manager.set_schedule_enabled(&schedule_id, false).await {
                    warn!("禁用调度条目 {} 失败: {}", schedule.name, e);
                }
            }
            applied += 1;
        }
        applied
    }

    /// 运行应用程序直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.manager.start().await;

        let _ = shutdown_rx.recv().await;
        info!("收到关闭信号，停止任务管理器");

        self.manager.stop().await;

        let stats = self.manager.get_stats().await;
        info!(
            "任务管理器统计: 完成 {}，失败 {}，取消 {}，重试 {}",
            stats.completed, stats.failed, stats.cancelled, stats.retries
        );
        Ok(())
    }
}

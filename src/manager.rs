//! 任务管理器
//!
//! 进程内的后台任务子系统入口：注册任务定义、创建调度条目、临时提交
//! 执行实例、启动/停止执行池以及查询统计信息。
//!
//! ```rust,no_run
//! use job_manager::manager::JobManager;
//! use jobs_core::models::{JobDefinition, JobParams, JobResult};
//! use jobs_core::{handler_fn, ManagerConfig};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let manager = JobManager::new(ManagerConfig::default());
//! manager
//!     .register_job(JobDefinition::new(
//!         "fub_sync",
//!         "FUB Contact Sync",
//!         handler_fn(|_ctx, params| async move { Ok(JobResult::success(params)) }),
//!     ))
//!     .await?;
//! manager.schedule_job("fub_sync", "every two hours", "0 */2 * * *", JobParams::new()).await?;
//! manager.start().await;
//! let execution = manager.queue_job("fub_sync", JobParams::new()).await?;
//! println!("queued {}", execution.id);
//! manager.stop().await;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use jobs_core::models::{
    Execution, ExecutionSource, JobDefinition, JobParams, ScheduleEntry, ScheduleExpr,
};
use jobs_core::{ManagerConfig, SchedulerError, SchedulerResult, ShutdownManager};
use jobs_dispatcher::{ExecutionDispatcher, RetryService, ScheduleLoop};
use jobs_infrastructure::StructuredLogger;
use jobs_worker::{WorkerPool, WorkerSnapshot};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const CANCELLED_ON_STOP: &str = "manager stopped before execution started";

/// 运行时统计快照
#[derive(Debug, Clone, Serialize)]
pub struct JobStats {
    pub registered_jobs: usize,
    pub scheduled_jobs: usize,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    /// 所有Worker成功完成的尝试次数
    pub total_processed: u64,
    /// 所有Worker失败的尝试次数
    pub total_errors: u64,
    pub running: bool,
    pub worker_count: usize,
    pub workers: Vec<WorkerSnapshot>,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub retries: u64,
    pub timeouts: u64,
    pub dropped_fires: u64,
    pub dropped_retries: u64,
}

struct RunningState {
    pool: Arc<WorkerPool>,
    scheduler: Option<JoinHandle<()>>,
}

/// 后台任务管理器
///
/// 显式构造并通过 `Arc` 共享，不使用全局单例。
pub struct JobManager {
    config: ManagerConfig,
    dispatcher: ExecutionDispatcher,
    retry_service: RetryService,
    shutdown: ShutdownManager,
    started: AtomicBool,
    stopped: AtomicBool,
    state: Mutex<Option<RunningState>>,
}

impl JobManager {
    pub fn new(config: ManagerConfig) -> Self {
        let dispatcher =
            ExecutionDispatcher::new(config.queue_capacity, config.execution_history_limit);
        let shutdown = ShutdownManager::new();
        let retry_service = RetryService::new(dispatcher.clone(), shutdown.clone());

        Self {
            config,
            dispatcher,
            retry_service,
            shutdown,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            state: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// 注册任务定义，ID重复时返回 `DuplicateJob`
    pub async fn register_job(&self, mut job: JobDefinition) -> SchedulerResult<()> {
        let now = Utc::now();
        job.created_at = now;
        job.updated_at = now;

        let job = self.dispatcher.registry.register(job).await?;
        StructuredLogger::log_job_registered(&job.id, &job.name, &job.job_type, job.max_retries);
        Ok(())
    }

    /// 用调度表达式字符串创建调度条目，返回条目ID
    pub async fn schedule_job(
        &self,
        job_id: &str,
        name: &str,
        expression: &str,
        parameters: JobParams,
    ) -> SchedulerResult<String> {
        if !self.dispatcher.registry.contains_job(job_id).await {
            return Err(SchedulerError::job_not_found(job_id));
        }
        let schedule: ScheduleExpr = expression.parse()?;
        self.schedule_job_expr(job_id, name, schedule, parameters)
            .await
    }

    /// 用已解析的调度表达式创建调度条目，返回条目ID
    pub async fn schedule_job_expr(
        &self,
        job_id: &str,
        name: &str,
        schedule: ScheduleExpr,
        parameters: JobParams,
    ) -> SchedulerResult<String> {
        let entry = ScheduleEntry::new(job_id, name, schedule, parameters, Utc::now());
        let entry = self.dispatcher.registry.add_schedule(entry).await?;

        StructuredLogger::log_schedule_created(
            &entry.id,
            &entry.job_id,
            &entry.schedule.to_string(),
            entry.next_run,
        );
        Ok(entry.id)
    }

    /// 启用或禁用调度条目
    pub async fn set_schedule_enabled(
        &self,
        schedule_id: &str,
        enabled: bool,
    ) -> SchedulerResult<ScheduleEntry> {
        let entry = self
            .dispatcher
            .registry
            .set_schedule_enabled(schedule_id, enabled)
            .await?;
        StructuredLogger::log_schedule_toggled(&entry.id, enabled);
        Ok(entry)
    }

    /// 临时提交一个执行实例，不会阻塞
    ///
    /// 返回入队时刻的快照，之后的状态通过 [`JobManager::get_execution`] 查询。
    pub async fn queue_job(&self, job_id: &str, parameters: JobParams) -> SchedulerResult<Execution> {
        let execution = Execution::new(job_id, parameters, ExecutionSource::Manual);
        self.enqueue(execution).await
    }

    /// 立即用调度条目的参数提交一次执行，不影响条目的 `next_run`
    ///
    /// 已禁用的条目返回 `ScheduleDisabled`。
    pub async fn trigger_schedule(&self, schedule_id: &str) -> SchedulerResult<Execution> {
        let entry = self
            .dispatcher
            .registry
            .get_schedule(schedule_id)
            .await
            .ok_or_else(|| SchedulerError::schedule_not_found(schedule_id))?;
        if !entry.enabled {
            return Err(SchedulerError::ScheduleDisabled { id: entry.id });
        }

        let execution = Execution::new(
            entry.job_id,
            entry.parameters,
            ExecutionSource::Scheduled {
                schedule_id: entry.id,
            },
        );
        self.enqueue(execution).await
    }

    async fn enqueue(&self, execution: Execution) -> SchedulerResult<Execution> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(SchedulerError::ManagerStopped);
        }
        if !self.dispatcher.registry.contains_job(&execution.job_id).await {
            return Err(SchedulerError::job_not_found(&execution.job_id));
        }

        let snapshot = execution.clone();
        self.dispatcher.submit(execution).await?;

        // stop() 可能在上面的检查之后已经完成了最后一次清理
        if self.stopped.load(Ordering::SeqCst) {
            self.dispatcher.cancel_queued(CANCELLED_ON_STOP).await;
            return Err(SchedulerError::ManagerStopped);
        }
        Ok(snapshot)
    }

    /// 启动执行池和调度循环，整个生命周期内只生效一次
    ///
    /// 返回本次调用是否真正启动。
    pub async fn start(&self) -> bool {
        if self.stopped.load(Ordering::SeqCst) {
            warn!("任务管理器已停止，不能再次启动");
            return false;
        }
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("任务管理器已经启动过，忽略重复调用");
            return false;
        }

        let pool = WorkerPool::spawn(
            self.config.worker_count,
            &self.config.worker_id_prefix,
            self.dispatcher.clone(),
            self.retry_service.clone(),
            self.shutdown.clone(),
        );

        let schedule_loop = ScheduleLoop::new(
            self.dispatcher.clone(),
            self.config.tick_interval(),
            self.shutdown.clone(),
        );
        let scheduler = tokio::spawn(schedule_loop.run());

        *self.state.lock().await = Some(RunningState {
            pool: Arc::new(pool),
            scheduler: Some(scheduler),
        });

        info!(
            "任务管理器已启动: {} 个Worker，队列容量 {}，扫描间隔 {:?}",
            self.config.worker_count,
            self.dispatcher.queue.capacity(),
            self.config.tick_interval()
        );
        true
    }

    /// 停止任务管理器
    ///
    /// 发出关闭信号，取消仍在排队的执行实例，然后在 `shutdown_timeout` 内
    /// 等待Worker和调度循环退出。正在执行的实例不会被中断。
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("正在停止任务管理器");
        self.shutdown.shutdown().await;

        let cancelled = self.dispatcher.cancel_queued(CANCELLED_ON_STOP).await;
        if cancelled > 0 {
            info!("已取消 {} 个排队中的执行实例", cancelled);
        }

        let timeout = self.config.shutdown_timeout();
        let (pool, scheduler) = match self.state.lock().await.as_mut() {
            Some(running) => (Some(Arc::clone(&running.pool)), running.scheduler.take()),
            None => (None, None),
        };

        if let Some(scheduler) = scheduler {
            if tokio::time::timeout(timeout, scheduler).await.is_err() {
                warn!("等待调度循环退出超时");
            }
        }
        if let Some(pool) = pool {
            if !pool.join(timeout).await {
                warn!("部分Worker在 {:?} 内未退出", timeout);
            }
        }

        // 停止过程中并发提交的实例
        self.dispatcher.cancel_queued(CANCELLED_ON_STOP).await;
        info!("任务管理器已停止");
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.stopped.load(Ordering::SeqCst)
    }

    /// 只读统计快照，任何时候都可以调用
    pub async fn get_stats(&self) -> JobStats {
        let metrics = self.dispatcher.metrics.snapshot();
        let pool = self
            .state
            .lock()
            .await
            .as_ref()
            .map(|running| Arc::clone(&running.pool));
        let (workers, total_processed, total_errors) = match pool {
            Some(pool) => (
                pool.snapshot().await,
                pool.total_processed(),
                pool.total_errors(),
            ),
            None => (Vec::new(), 0, 0),
        };

        JobStats {
            registered_jobs: self.dispatcher.registry.job_count().await,
            scheduled_jobs: self.dispatcher.registry.schedule_count().await,
            queue_depth: self.dispatcher.queue.len(),
            queue_capacity: self.dispatcher.queue.capacity(),
            total_processed,
            total_errors,
            running: self.is_running(),
            worker_count: workers.len(),
            workers,
            completed: metrics.completed,
            failed: metrics.failed,
            cancelled: metrics.cancelled,
            retries: metrics.retries,
            timeouts: metrics.timeouts,
            dropped_fires: metrics.dropped_fires,
            dropped_retries: metrics.dropped_retries,
        }
    }

    /// 按ID查询执行实例的最新快照
    pub async fn get_execution(&self, execution_id: &str) -> SchedulerResult<Execution> {
        self.dispatcher
            .store
            .get(execution_id)
            .await
            .ok_or_else(|| SchedulerError::execution_not_found(execution_id))
    }

    /// 最近的执行实例，最新的在前
    pub async fn recent_executions(&self, limit: usize) -> Vec<Execution> {
        self.dispatcher.store.recent(limit).await
    }

    pub async fn list_jobs(&self) -> Vec<Arc<JobDefinition>> {
        self.dispatcher.registry.list_jobs().await
    }

    pub async fn list_schedules(&self) -> Vec<ScheduleEntry> {
        self.dispatcher.registry.list_schedules().await
    }

    pub async fn get_schedule(&self, schedule_id: &str) -> SchedulerResult<ScheduleEntry> {
        self.dispatcher
            .registry
            .get_schedule(schedule_id)
            .await
            .ok_or_else(|| SchedulerError::schedule_not_found(schedule_id))
    }
}

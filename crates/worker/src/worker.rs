use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use jobs_core::models::{Execution, JobDefinition, JobResult};
use jobs_core::traits::JobContext;
use jobs_core::{SchedulerError, SchedulerResult, ShutdownManager};
use jobs_dispatcher::{ExecutionDispatcher, RetryService};
use jobs_infrastructure::StructuredLogger;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// 单个Worker的运行统计
#[derive(Debug, Default)]
pub struct WorkerStats {
    processed: AtomicU64,
    errors: AtomicU64,
    busy: AtomicBool,
    current_execution: RwLock<Option<String>>,
}

/// Worker统计快照
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WorkerSnapshot {
    pub id: String,
    /// 成功的尝试次数
    pub processed: u64,
    /// 失败的尝试次数（含超时）
    pub errors: u64,
    pub busy: bool,
    pub current_execution: Option<String>,
}

impl WorkerStats {
    pub async fn snapshot(&self, worker_id: &str) -> WorkerSnapshot {
        WorkerSnapshot {
            id: worker_id.to_string(),
            processed: self.processed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            busy: self.busy.load(Ordering::Relaxed),
            current_execution: self.current_execution.read().await.clone(),
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

enum AttemptOutcome {
    Succeeded(JobResult),
    Failed {
        error: String,
        result: Option<JobResult>,
    },
}

/// 执行池中的一个Worker
///
/// 循环等待关闭信号或队列中的下一个执行实例。已经取出的实例会执行到
/// 完成或超时，关闭信号只在两次执行之间生效。
pub struct Worker {
    id: String,
    dispatcher: ExecutionDispatcher,
    retry_service: RetryService,
    shutdown: ShutdownManager,
    stats: Arc<WorkerStats>,
    busy_workers: Arc<AtomicUsize>,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        dispatcher: ExecutionDispatcher,
        retry_service: RetryService,
        shutdown: ShutdownManager,
        busy_workers: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            id: id.into(),
            dispatcher,
            retry_service,
            shutdown,
            stats: Arc::new(WorkerStats::default()),
            busy_workers,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// 运行直到收到关闭信号
    pub async fn run(self) {
        let mut shutdown_rx = self.shutdown.subscribe().await;
        info!("Worker {} 已启动", self.id);

        loop {
            let execution = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    debug!("Worker {} 收到关闭信号", self.id);
                    break;
                }
                received = self.dispatcher.queue.recv() => match received {
                    Some(execution) => execution,
                    None => break,
                },
            };

            self.process(execution).await;
        }

        info!("Worker {} 已退出", self.id);
    }

    /// 执行一次尝试，并根据结果完成、重试或标记失败
    pub async fn process(&self, mut execution: Execution) {
        self.dispatcher
            .metrics
            .update_queue_depth(self.dispatcher.queue.len());

        if execution.is_terminal() {
            debug!("跳过已结束的执行实例 {}", execution.id);
            return;
        }

        let Some(job) = self.dispatcher.registry.get_job(&execution.job_id).await else {
            let error = SchedulerError::job_not_found(&execution.job_id).to_string();
            error!("执行实例 {} 引用了未注册的任务", execution.id);
            execution.mark_failed(error.clone(), None);
            self.dispatcher.metrics.record_failed(&execution.job_id);
            self.dispatcher.publish(&execution).await;
            StructuredLogger::log_execution_failed(&execution, &error);
            return;
        };

        self.begin(&execution.id).await;

        let attempt = execution.mark_running(&self.id);
        self.dispatcher.publish(&execution).await;
        StructuredLogger::log_execution_started(&execution, &self.id, attempt);

        let started = Instant::now();
        let outcome = self.run_attempt(&job, &execution, attempt).await;
        let elapsed = started.elapsed();

        match outcome {
            AttemptOutcome::Succeeded(mut result) => {
                self.stats.processed.fetch_add(1, Ordering::Relaxed);
                result.duration = elapsed;
                execution.mark_completed(result);
                self.dispatcher
                    .metrics
                    .record_completed(&execution.job_id, elapsed);
                self.dispatcher.publish(&execution).await;
                StructuredLogger::log_execution_completed(&execution, elapsed);
            }
            AttemptOutcome::Failed { error, result } => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                self.dispatcher
                    .metrics
                    .record_attempt_failed(&execution.job_id, elapsed);
                let result = result.map(|mut result| {
                    result.duration = elapsed;
                    result
                });
                self.retry_service
                    .handle_failure(execution, &job, error, result)
                    .await;
            }
        }

        self.finish().await;
    }

    async fn run_attempt(
        &self,
        job: &JobDefinition,
        execution: &Execution,
        attempt: u32,
    ) -> AttemptOutcome {
        let token = CancellationToken::new();
        let ctx = JobContext {
            execution_id: execution.id.clone(),
            job_id: execution.job_id.clone(),
            attempt,
            worker_id: self.id.clone(),
            deadline: deadline_after(job.timeout),
            cancellation_token: token.clone(),
        };

        let handler_future =
            AssertUnwindSafe(job.handler.execute(ctx, &execution.parameters)).catch_unwind();

        let result: SchedulerResult<JobResult> =
            match tokio::time::timeout(job.timeout, handler_future).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(SchedulerError::handler("任务处理器发生panic")),
                Err(_) => {
                    token.cancel();
                    self.dispatcher.metrics.record_timeout(&execution.job_id);
                    Err(SchedulerError::ExecutionTimeout {
                        timeout_ms: job.timeout.as_millis() as u64,
                    })
                }
            };

        match result {
            Ok(result) if result.success => AttemptOutcome::Succeeded(result),
            Ok(result) => AttemptOutcome::Failed {
                error: result
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "任务处理器返回失败结果".to_string()),
                result: Some(result),
            },
            Err(e) => AttemptOutcome::Failed {
                error: e.to_string(),
                result: None,
            },
        }
    }

    async fn begin(&self, execution_id: &str) {
        *self.stats.current_execution.write().await = Some(execution_id.to_string());
        self.stats.busy.store(true, Ordering::Relaxed);
        let busy = self.busy_workers.fetch_add(1, Ordering::Relaxed) + 1;
        self.dispatcher.metrics.update_busy_workers(busy);
    }

    async fn finish(&self) {
        *self.stats.current_execution.write().await = None;
        self.stats.busy.store(false, Ordering::Relaxed);
        let busy = self.busy_workers.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        self.dispatcher.metrics.update_busy_workers(busy);
    }
}

fn deadline_after(timeout: Duration) -> DateTime<Utc> {
    let now = Utc::now();
    chrono::Duration::from_std(timeout)
        .ok()
        .and_then(|timeout| now.checked_add_signed(timeout))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

use std::time::Duration;

use jobs_core::models::{Execution, JobDefinition, JobResult};
use jobs_core::ShutdownManager;
use jobs_infrastructure::StructuredLogger;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::dispatch::ExecutionDispatcher;

const CANCELLED_BEFORE_RETRY: &str = "manager stopped before retry";

/// 失败处理结果
#[derive(Debug)]
pub enum RetryDecision {
    /// 已安排在延迟后重新入队
    Scheduled {
        delay: Duration,
        timer: JoinHandle<()>,
    },
    /// 重试次数已用尽，执行实例已标记为失败
    Exhausted,
}

impl RetryDecision {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, RetryDecision::Scheduled { .. })
    }
}

/// 重试服务
///
/// 固定间隔重试：尝试次数小于 `1 + max_retries` 时，由独立的定时任务在
/// `retry_delay` 之后重新入队，Worker本身不等待。重新入队时队列已满，
/// 重试被丢弃，执行实例标记为失败并计入丢弃指标。
#[derive(Clone)]
pub struct RetryService {
    dispatcher: ExecutionDispatcher,
    shutdown: ShutdownManager,
}

impl RetryService {
    pub fn new(dispatcher: ExecutionDispatcher, shutdown: ShutdownManager) -> Self {
        Self {
            dispatcher,
            shutdown,
        }
    }

    /// 处理一次失败的尝试，决定重试还是最终失败
    pub async fn handle_failure(
        &self,
        mut execution: Execution,
        job: &JobDefinition,
        error: String,
        result: Option<JobResult>,
    ) -> RetryDecision {
        if execution.attempts >= job.max_attempts() {
            execution.mark_failed(error.clone(), result);
            self.dispatcher.metrics.record_failed(&execution.job_id);
            self.dispatcher.publish(&execution).await;
            StructuredLogger::log_execution_failed(&execution, &error);
            return RetryDecision::Exhausted;
        }

        execution.mark_retrying(error.clone());
        self.dispatcher.publish(&execution).await;
        self.dispatcher.metrics.record_retry(&execution.job_id);
        StructuredLogger::log_execution_retrying(&execution, &error, job.retry_delay);

        let delay = job.retry_delay;
        let timer = tokio::spawn(Self::retry_after(
            self.dispatcher.clone(),
            self.shutdown.clone(),
            execution,
            delay,
        ));

        RetryDecision::Scheduled { delay, timer }
    }

    async fn retry_after(
        dispatcher: ExecutionDispatcher,
        shutdown: ShutdownManager,
        mut execution: Execution,
        delay: Duration,
    ) {
        let mut shutdown_rx = shutdown.subscribe().await;

        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                execution.mark_cancelled(CANCELLED_BEFORE_RETRY);
                dispatcher.publish(&execution).await;
                dispatcher.metrics.record_cancelled(&execution.job_id);
                StructuredLogger::log_execution_cancelled(&execution, CANCELLED_BEFORE_RETRY);
            }
            _ = tokio::time::sleep(delay) => {
                execution.mark_pending();
                let execution_id = execution.id.clone();
                match dispatcher.resubmit(execution).await {
                    Ok(()) => {
                        debug!("执行实例 {} 已重新入队", execution_id);
                    }
                    Err(err) => {
                        let capacity = err.capacity;
                        let mut execution = err.execution;
                        StructuredLogger::log_retry_dropped(&execution, capacity);
                        execution.mark_failed(
                            format!("retry dropped: execution queue full (capacity {capacity})"),
                            None,
                        );
                        dispatcher.metrics.record_dropped_retry(&execution.job_id);
                        dispatcher.metrics.record_failed(&execution.job_id);
                        dispatcher.publish(&execution).await;
                        info!("执行实例 {} 的重试被丢弃，标记为失败", execution.id);
                    }
                }
            }
        }
    }
}

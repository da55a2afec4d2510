use std::sync::Arc;

use jobs_core::models::Execution;
use jobs_infrastructure::{
    ExecutionQueue, ExecutionStore, JobMetrics, JobRegistry, QueueFullError, StructuredLogger,
};

/// 执行实例分发器
///
/// 把执行队列、执行记录存储、注册表和指标收集器组合在一起，
/// 供调度循环、重试定时器、Worker和管理器共享。克隆开销很小。
#[derive(Clone)]
pub struct ExecutionDispatcher {
    pub registry: Arc<JobRegistry>,
    pub queue: ExecutionQueue,
    pub store: Arc<ExecutionStore>,
    pub metrics: Arc<JobMetrics>,
}

impl ExecutionDispatcher {
    pub fn new(queue_capacity: usize, history_limit: usize) -> Self {
        Self {
            registry: Arc::new(JobRegistry::new()),
            queue: ExecutionQueue::new(queue_capacity),
            store: Arc::new(ExecutionStore::new(history_limit)),
            metrics: Arc::new(JobMetrics::new()),
        }
    }

    /// 提交新创建的执行实例
    ///
    /// 快照先于入队写入存储，保证Worker写入的后续状态不会被覆盖。
    /// 队列已满时撤销快照并把实例退回给调用方。
    pub async fn submit(&self, execution: Execution) -> Result<(), QueueFullError> {
        self.store.record(&execution).await;
        let snapshot = execution.clone();

        match self.queue.try_enqueue(execution) {
            Ok(()) => {
                self.metrics.record_queued(&snapshot.job_id);
                self.metrics.update_queue_depth(self.queue.len());
                StructuredLogger::log_execution_queued(&snapshot);
                Ok(())
            }
            Err(err) => {
                self.store.remove(&snapshot.id).await;
                Err(err)
            }
        }
    }

    /// 重新提交等待重试的执行实例，队列已满时实例保持原样退回
    pub async fn resubmit(&self, execution: Execution) -> Result<(), QueueFullError> {
        self.store.record(&execution).await;
        self.queue.try_enqueue(execution)?;
        self.metrics.update_queue_depth(self.queue.len());
        Ok(())
    }

    /// 记录状态转换后的快照
    pub async fn publish(&self, execution: &Execution) {
        self.store.record(execution).await;
    }

    /// 取出所有仍在排队的执行实例并标记为已取消
    pub async fn cancel_queued(&self, reason: &str) -> usize {
        let drained = self.queue.drain().await;
        let count = drained.len();
        for mut execution in drained {
            execution.mark_cancelled(reason);
            self.store.record(&execution).await;
            self.metrics.record_cancelled(&execution.job_id);
            StructuredLogger::log_execution_cancelled(&execution, reason);
        }
        self.metrics.update_queue_depth(self.queue.len());
        count
    }
}

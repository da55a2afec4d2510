use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use jobs_core::ShutdownManager;
use jobs_dispatcher::{ExecutionDispatcher, RetryService};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::worker::{Worker, WorkerSnapshot, WorkerStats};

/// 固定大小的Worker池
pub struct WorkerPool {
    workers: Vec<(String, Arc<WorkerStats>)>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// 启动 `count` 个Worker，ID为 `{prefix}-1` .. `{prefix}-{count}`
    pub fn spawn(
        count: usize,
        prefix: &str,
        dispatcher: ExecutionDispatcher,
        retry_service: RetryService,
        shutdown: ShutdownManager,
    ) -> Self {
        let busy_workers = Arc::new(AtomicUsize::new(0));
        let mut workers = Vec::with_capacity(count);
        let mut handles = Vec::with_capacity(count);

        for index in 1..=count {
            let worker = Worker::new(
                format!("{prefix}-{index}"),
                dispatcher.clone(),
                retry_service.clone(),
                shutdown.clone(),
                Arc::clone(&busy_workers),
            );
            workers.push((worker.id().to_string(), worker.stats()));
            handles.push(tokio::spawn(worker.run()));
        }

        info!("已启动 {} 个Worker", count);
        Self {
            workers,
            handles: Mutex::new(handles),
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<WorkerSnapshot> {
        let mut snapshots = Vec::with_capacity(self.workers.len());
        for (id, stats) in &self.workers {
            snapshots.push(stats.snapshot(id).await);
        }
        snapshots
    }

    pub fn total_processed(&self) -> u64 {
        self.workers.iter().map(|(_, stats)| stats.processed()).sum()
    }

    pub fn total_errors(&self) -> u64 {
        self.workers.iter().map(|(_, stats)| stats.errors()).sum()
    }

    /// 等待所有Worker退出，超时返回 `false`
    ///
    /// 超时不会中止仍在执行的Worker。
    pub async fn join(&self, timeout: Duration) -> bool {
        let handles = std::mem::take(&mut *self.handles.lock().await);
        if handles.is_empty() {
            return true;
        }

        match tokio::time::timeout(timeout, join_all(handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        warn!("Worker任务异常退出: {}", e);
                    }
                }
                true
            }
            Err(_) => {
                warn!("等待Worker退出超时 ({:?})", timeout);
                false
            }
        }
    }
}

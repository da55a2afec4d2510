use std::sync::Arc;

use jobs_core::models::Execution;
use jobs_core::SchedulerError;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// 入队失败：队列已满，执行实例原样退回
#[derive(Debug)]
pub struct QueueFullError {
    pub execution: Execution,
    pub capacity: usize,
}

impl From<QueueFullError> for SchedulerError {
    fn from(err: QueueFullError) -> Self {
        SchedulerError::QueueFull {
            capacity: err.capacity,
        }
    }
}

/// 有界内存执行队列
///
/// 使用 Tokio 有界通道实现。生产者（调度循环、临时提交、重试定时器）
/// 永远不会阻塞：队列满时 `try_enqueue` 立即失败，这就是系统的背压机制。
/// 接收端用 `Mutex` 包装以支持多个Worker竞争消费，每个实例只会被一个Worker取到。
#[derive(Debug, Clone)]
pub struct ExecutionQueue {
    sender: mpsc::Sender<Execution>,
    /// 使用 Arc 包装接收端，支持多个消费者
    receiver: Arc<Mutex<mpsc::Receiver<Execution>>>,
}

impl ExecutionQueue {
    /// 创建指定容量的队列，容量至少为1
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// 非阻塞入队
    pub fn try_enqueue(&self, execution: Execution) -> Result<(), QueueFullError> {
        match self.sender.try_send(execution) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(execution))
            | Err(mpsc::error::TrySendError::Closed(execution)) => {
                debug!("执行队列已满，拒绝执行实例 {}", execution.id);
                Err(QueueFullError {
                    execution,
                    capacity: self.capacity(),
                })
            }
        }
    }

    /// 等待并取出下一个执行实例。取消安全，可以放在 `select!` 中使用。
    pub async fn recv(&self) -> Option<Execution> {
        let mut receiver = self.receiver.lock().await;
        receiver.recv().await
    }

    /// 取出当前所有排队中的执行实例
    pub async fn drain(&self) -> Vec<Execution> {
        let mut receiver = self.receiver.lock().await;
        let mut drained = Vec::new();
        while let Ok(execution) = receiver.try_recv() {
            drained.push(execution);
        }
        drained
    }

    /// 当前排队数量
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobs_core::models::{ExecutionSource, JobParams};
    use std::time::Duration;

    fn execution(job_id: &str) -> Execution {
        Execution::new(job_id, JobParams::new(), ExecutionSource::Manual)
    }

    #[tokio::test]
    async fn test_enqueue_and_recv() {
        let queue = ExecutionQueue::new(4);
        assert!(queue.is_empty());

        let exec = execution("echo");
        let id = exec.id.clone();
        queue.try_enqueue(exec).unwrap();
        assert_eq!(queue.len(), 1);

        let received = queue.recv().await.unwrap();
        assert_eq!(received.id, id);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_queue_full_returns_execution() {
        let queue = ExecutionQueue::new(2);
        queue.try_enqueue(execution("a")).unwrap();
        queue.try_enqueue(execution("b")).unwrap();

        let rejected = execution("c");
        let rejected_id = rejected.id.clone();
        let err = queue.try_enqueue(rejected).unwrap_err();
        assert_eq!(err.execution.id, rejected_id);
        assert_eq!(err.capacity, 2);
        assert_eq!(queue.len(), 2);

        let scheduler_err: SchedulerError = err.into();
        assert!(matches!(scheduler_err, SchedulerError::QueueFull { capacity: 2 }));
    }

    #[tokio::test]
    async fn test_drain() {
        let queue = ExecutionQueue::new(8);
        for name in ["a", "b", "c"] {
            queue.try_enqueue(execution(name)).unwrap();
        }

        let drained = queue.drain().await;
        let jobs: Vec<_> = drained.iter().map(|e| e.job_id.as_str()).collect();
        assert_eq!(jobs, vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_each_item_delivered_once() {
        let queue = ExecutionQueue::new(16);
        for i in 0..10 {
            queue.try_enqueue(execution(&format!("job-{i}"))).unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..3 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Ok(Some(exec)) =
                    tokio::time::timeout(Duration::from_millis(50), queue.recv()).await
                {
                    seen.push(exec.id);
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 10);
    }
}

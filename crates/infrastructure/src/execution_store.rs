use std::collections::{HashMap, VecDeque};

use jobs_core::models::{Execution, ExecutionStatus};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct StoreState {
    executions: HashMap<String, Execution>,
    /// 插入顺序，用于淘汰最旧的已结束记录
    order: VecDeque<String>,
}

/// 执行记录存储
///
/// 保存每个执行实例最近一次状态转换后的快照。超过历史上限时淘汰
/// 最早的已结束记录，未结束的记录永远不会被淘汰。
pub struct ExecutionStore {
    state: RwLock<StoreState>,
    history_limit: usize,
}

impl ExecutionStore {
    pub fn new(history_limit: usize) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            history_limit: history_limit.max(1),
        }
    }

    /// 写入或更新执行快照
    pub async fn record(&self, execution: &Execution) {
        let mut state = self.state.write().await;
        if state
            .executions
            .insert(execution.id.clone(), execution.clone())
            .is_none()
        {
            state.order.push_back(execution.id.clone());
        }
        Self::evict(&mut state, self.history_limit);
    }

    fn evict(state: &mut StoreState, limit: usize) {
        while state.executions.len() > limit {
            let position = state.order.iter().position(|id| {
                state
                    .executions
                    .get(id)
                    .map(|exec| exec.is_terminal())
                    .unwrap_or(true)
            });
            let Some(position) = position else {
                break;
            };
            if let Some(id) = state.order.remove(position) {
                state.executions.remove(&id);
                debug!("淘汰执行记录 {}", id);
            }
        }
    }

    /// 删除记录，用于撤销未能入队的执行实例
    pub async fn remove(&self, execution_id: &str) -> Option<Execution> {
        let mut state = self.state.write().await;
        let removed = state.executions.remove(execution_id)?;
        state.order.retain(|id| id != execution_id);
        Some(removed)
    }

    pub async fn get(&self, execution_id: &str) -> Option<Execution> {
        self.state.read().await.executions.get(execution_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.executions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn count_by_status(&self, status: ExecutionStatus) -> usize {
        self.state
            .read()
            .await
            .executions
            .values()
            .filter(|exec| exec.status == status)
            .count()
    }

    /// 最近写入的 `limit` 条记录，最新的在前
    pub async fn recent(&self, limit: usize) -> Vec<Execution> {
        let state = self.state.read().await;
        state
            .order
            .iter()
            .rev()
            .filter_map(|id| state.executions.get(id))
            .take(limit)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobs_core::models::{ExecutionSource, JobParams, JobResult};

    fn execution(job_id: &str) -> Execution {
        Execution::new(job_id, JobParams::new(), ExecutionSource::Manual)
    }

    #[tokio::test]
    async fn test_record_upserts() {
        let store = ExecutionStore::new(10);
        let mut exec = execution("echo");
        store.record(&exec).await;

        exec.mark_running("worker-1");
        store.record(&exec).await;
        assert_eq!(store.len().await, 1);

        let stored = store.get(&exec.id).await.unwrap();
        assert_eq!(stored.status, ExecutionStatus::Running);
        assert_eq!(store.count_by_status(ExecutionStatus::Running).await, 1);
        assert!(store.get("exec_missing").await.is_none());

        assert!(store.remove(&exec.id).await.is_some());
        assert!(store.is_empty().await);
        assert!(store.recent(5).await.is_empty());
    }

    #[tokio::test]
    async fn test_evicts_oldest_terminal() {
        let store = ExecutionStore::new(2);

        let running = {
            let mut exec = execution("long");
            exec.mark_running("worker-1");
            exec
        };
        store.record(&running).await;

        let mut done = execution("short");
        done.mark_running("worker-2");
        done.mark_completed(JobResult::success(JobParams::new()));
        store.record(&done).await;

        let newest = execution("queued");
        store.record(&newest).await;

        assert_eq!(store.len().await, 2);
        assert!(store.get(&running.id).await.is_some());
        assert!(store.get(&done.id).await.is_none());
        assert!(store.get(&newest.id).await.is_some());
    }

    #[tokio::test]
    async fn test_never_evicts_in_flight() {
        let store = ExecutionStore::new(1);
        let first = execution("a");
        let second = execution("b");
        store.record(&first).await;
        store.record(&second).await;
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_recent_newest_first() {
        let store = ExecutionStore::new(10);
        let ids: Vec<_> = (0..3)
            .map(|i| execution(&format!("job-{i}")))
            .collect();
        for exec in &ids {
            store.record(exec).await;
        }

        let recent = store.recent(2).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, ids[2].id);
        assert_eq!(recent[1].id, ids[1].id);
    }
}

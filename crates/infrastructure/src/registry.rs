use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use jobs_core::models::{JobDefinition, ScheduleEntry};
use jobs_core::{SchedulerError, SchedulerResult};
use tokio::sync::RwLock;

#[derive(Default)]
struct RegistryState {
    jobs: HashMap<String, Arc<JobDefinition>>,
    schedules: HashMap<String, ScheduleEntry>,
}

/// 任务定义与调度条目注册表
///
/// 调度循环、Worker和调用方并发访问，所有状态位于同一把读写锁之后。
/// 调度条目的 `next_run` 只由调度循环推进。
#[derive(Default)]
pub struct JobRegistry {
    state: RwLock<RegistryState>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册任务定义，ID重复时返回 `DuplicateJob`
    pub async fn register(&self, job: JobDefinition) -> SchedulerResult<Arc<JobDefinition>> {
        let mut state = self.state.write().await;
        if state.jobs.contains_key(&job.id) {
            return Err(SchedulerError::DuplicateJob { id: job.id });
        }
        let job = Arc::new(job);
        state.jobs.insert(job.id.clone(), Arc::clone(&job));
        Ok(job)
    }

    pub async fn get_job(&self, job_id: &str) -> Option<Arc<JobDefinition>> {
        self.state.read().await.jobs.get(job_id).cloned()
    }

    pub async fn contains_job(&self, job_id: &str) -> bool {
        self.state.read().await.jobs.contains_key(job_id)
    }

    /// 按ID排序返回所有任务定义
    pub async fn list_jobs(&self) -> Vec<Arc<JobDefinition>> {
        let state = self.state.read().await;
        let mut jobs: Vec<_> = state.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        jobs
    }

    pub async fn job_count(&self) -> usize {
        self.state.read().await.jobs.len()
    }

    /// 添加调度条目，引用的任务必须已注册
    pub async fn add_schedule(&self, entry: ScheduleEntry) -> SchedulerResult<ScheduleEntry> {
        let mut state = self.state.write().await;
        if !state.jobs.contains_key(&entry.job_id) {
            return Err(SchedulerError::job_not_found(&entry.job_id));
        }
        state.schedules.insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    pub async fn get_schedule(&self, schedule_id: &str) -> Option<ScheduleEntry> {
        self.state.read().await.schedules.get(schedule_id).cloned()
    }

    /// 按下次触发时间排序返回所有调度条目
    pub async fn list_schedules(&self) -> Vec<ScheduleEntry> {
        let state = self.state.read().await;
        let mut schedules: Vec<_> = state.schedules.values().cloned().collect();
        schedules.sort_by(|a, b| a.next_run.cmp(&b.next_run).then_with(|| a.id.cmp(&b.id)));
        schedules
    }

    pub async fn schedule_count(&self) -> usize {
        self.state.read().await.schedules.len()
    }

    pub async fn set_schedule_enabled(
        &self,
        schedule_id: &str,
        enabled: bool,
    ) -> SchedulerResult<ScheduleEntry> {
        let mut state = self.state.write().await;
        let entry = state
            .schedules
            .get_mut(schedule_id)
            .ok_or_else(|| SchedulerError::schedule_not_found(schedule_id))?;
        entry.enabled = enabled;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    /// 返回在 `now` 时刻到期的调度条目快照
    pub async fn due_schedules(&self, now: DateTime<Utc>) -> Vec<ScheduleEntry> {
        let state = self.state.read().await;
        let mut due: Vec<_> = state
            .schedules
            .values()
            .filter(|entry| entry.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.next_run.cmp(&b.next_run).then_with(|| a.id.cmp(&b.id)));
        due
    }

    /// 在写锁内确认条目仍然启用且到期，然后推进它
    ///
    /// 返回推进前的快照；条目已被禁用、尚未到期或不存在时返回 `None`。
    pub async fn claim_due(&self, schedule_id: &str, now: DateTime<Utc>) -> Option<ScheduleEntry> {
        let mut state = self.state.write().await;
        let entry = state.schedules.get_mut(schedule_id)?;
        if !entry.is_due(now) {
            return None;
        }
        let claimed = entry.clone();
        entry.advance(now);
        Some(claimed)
    }

    /// 入队失败时撤销 [`JobRegistry::claim_due`] 的推进，下一次扫描再触发
    pub async fn release_claim(&self, claimed: &ScheduleEntry) {
        let mut state = self.state.write().await;
        if let Some(entry) = state.schedules.get_mut(&claimed.id) {
            if entry.last_run == Some(claimed.next_run) {
                entry.next_run = claimed.next_run;
                entry.last_run = claimed.last_run;
                entry.updated_at = claimed.updated_at;
            }
        }
    }
}

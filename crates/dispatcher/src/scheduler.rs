use std::time::Duration;

use chrono::{DateTime, Utc};
use jobs_core::models::{Execution, ExecutionSource};
use jobs_core::ShutdownManager;
use jobs_infrastructure::StructuredLogger;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::dispatch::ExecutionDispatcher;

/// 单次扫描的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub fired: usize,
    pub dropped: usize,
}

/// 调度循环
///
/// 按固定间隔扫描调度条目，为每个到期条目创建一个执行实例并入队。
/// 队列已满时本次触发被丢弃，条目的 `next_run` 保持不变，下一次扫描时再尝试。
/// 每次扫描中每个条目最多触发一次，错过的触发不会补跑。
pub struct ScheduleLoop {
    dispatcher: ExecutionDispatcher,
    tick_interval: Duration,
    shutdown: ShutdownManager,
}

impl ScheduleLoop {
    pub fn new(
        dispatcher: ExecutionDispatcher,
        tick_interval: Duration,
        shutdown: ShutdownManager,
    ) -> Self {
        Self {
            dispatcher,
            tick_interval,
            shutdown,
        }
    }

    /// 运行直到收到关闭信号
    pub async fn run(self) {
        let mut shutdown_rx = self.shutdown.subscribe().await;
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // interval 的第一次 tick 立即完成，第一次扫描发生在一个间隔之后
        ticker.tick().await;

        info!("调度循环已启动，扫描间隔: {:?}", self.tick_interval);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("调度循环收到关闭信号，退出");
                    break;
                }
                _ = ticker.tick() => {
                    let summary = self.check_scheduled_jobs(Utc::now()).await;
                    if summary.fired > 0 || summary.dropped > 0 {
                        debug!(
                            "本次扫描触发 {} 个调度条目，丢弃 {} 个",
                            summary.fired, summary.dropped
                        );
                    }
                }
            }
        }
    }

    /// 扫描 `now` 时刻到期的调度条目并入队
    pub async fn check_scheduled_jobs(&self, now: DateTime<Utc>) -> TickSummary {
        let mut summary = TickSummary::default();

        for due in self.dispatcher.registry.due_schedules(now).await {
            if self.shutdown.is_shutdown() {
                debug!("任务管理器已停止，跳过剩余调度条目");
                break;
            }

            // 快照之后条目可能已被禁用，触发前在写锁内重新确认
            let Some(entry) = self.dispatcher.registry.claim_due(&due.id, now).await else {
                debug!("调度条目 {} 已禁用或不再到期，跳过", due.id);
                continue;
            };

            let execution = Execution::new(
                entry.job_id.clone(),
                entry.parameters.clone(),
                ExecutionSource::Scheduled {
                    schedule_id: entry.id.clone(),
                },
            );
            let execution_id = execution.id.clone();

            match self.dispatcher.submit(execution).await {
                Ok(()) => {
                    debug!(
                        "调度条目 {} ({}) 已触发执行实例 {}，下次触发时间: {}",
                        entry.name,
                        entry.id,
                        execution_id,
                        entry.schedule.next_after(now)
                    );
                    summary.fired += 1;
                }
                Err(err) => {
                    self.dispatcher.registry.release_claim(&entry).await;
                    StructuredLogger::log_fire_dropped(&entry.id, &entry.job_id, err.capacity);
                    self.dispatcher.metrics.record_dropped_fire(&entry.job_id);
                    summary.dropped += 1;
                }
            }
        }

        summary
    }
}

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use job_manager::{
    handler_fn, Execution, ExecutionStatus, JobDefinition, JobManager, JobParams, JobResult,
    SchedulerError,
};
use jobs_core::ManagerConfig;
use serde_json::json;

fn config(workers: usize, queue_capacity: usize) -> ManagerConfig {
    ManagerConfig {
        worker_count: workers,
        queue_capacity,
        tick_interval_seconds: 60,
        shutdown_timeout_seconds: 5,
        ..ManagerConfig::default()
    }
}

fn echo_job(id: &str) -> JobDefinition {
    JobDefinition::new(
        id,
        "Echo",
        handler_fn(|_ctx, params| async move { Ok(JobResult::success(params)) }),
    )
}

async fn wait_terminal(manager: &JobManager, id: &str) -> Execution {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let execution = manager.get_execution(id).await.unwrap();
            if execution.is_terminal() {
                return execution;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("execution did not finish in time")
}

#[tokio::test]
async fn test_queue_unknown_job_creates_no_execution() {
    let manager = JobManager::new(config(1, 10));

    let err = manager
        .queue_job("nonexistent", JobParams::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulerError::JobNotFound { ref id } if id == "nonexistent"));
    assert!(manager.recent_executions(10).await.is_empty());
    assert_eq!(manager.get_stats().await.queue_depth, 0);
}

#[tokio::test]
async fn test_queue_full_is_reported_without_blocking() {
    let manager = JobManager::new(config(1, 2));
    manager.register_job(echo_job("echo")).await.unwrap();

    manager.queue_job("echo", JobParams::new()).await.unwrap();
    manager.queue_job("echo", JobParams::new()).await.unwrap();

    let err = manager.queue_job("echo", JobParams::new()).await.unwrap_err();
    assert!(matches!(err, SchedulerError::QueueFull { capacity: 2 }));

    let stats = manager.get_stats().await;
    assert_eq!(stats.queue_depth, 2);
    assert_eq!(stats.queue_capacity, 2);
    assert_eq!(manager.recent_executions(10).await.len(), 2);
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let manager = JobManager::new(config(1, 10));
    manager.register_job(echo_job("echo")).await.unwrap();

    let err = manager.register_job(echo_job("echo")).await.unwrap_err();
    assert!(matches!(err, SchedulerError::DuplicateJob { .. }));
    assert_eq!(manager.list_jobs().await.len(), 1);
}

#[tokio::test]
async fn test_schedule_job_validation() {
    let manager = JobManager::new(config(1, 10));
    manager.register_job(echo_job("report")).await.unwrap();

    let err = manager
        .schedule_job("missing", "Missing", "@daily", JobParams::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulerError::JobNotFound { .. }));

    let err = manager
        .schedule_job("report", "Bad", "*/5 9-17 * * 1-5", JobParams::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidSchedule { .. }));

    let id = manager
        .schedule_job("report", "Friday Report", "0 9 * * 5", JobParams::new())
        .await
        .unwrap();
    let entry = manager.get_schedule(&id).await.unwrap();
    assert!(entry.enabled);
    assert!(entry.last_run.is_none());
    assert!(entry.next_run > chrono::Utc::now());
    assert_eq!(manager.list_schedules().await.len(), 1);
}

#[tokio::test]
async fn test_always_failing_job_exhausts_retries() {
    let manager = JobManager::new(config(2, 10));
    manager
        .register_job(
            JobDefinition::new(
                "flaky_sync",
                "Flaky Sync",
                handler_fn(|_ctx, _params| async move {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(JobResult::success(JobParams::new()))
                }),
            )
            .with_timeout(Duration::from_millis(100))
            .with_max_retries(2)
            .with_retry_delay(Duration::from_millis(10)),
        )
        .await
        .unwrap();
    manager.start().await;

    let queued = manager.queue_job("flaky_sync", JobParams::new()).await.unwrap();
    assert_eq!(queued.status, ExecutionStatus::Pending);
    assert_eq!(queued.attempts, 0);

    let done = wait_terminal(&manager, &queued.id).await;
    assert_eq!(done.status, ExecutionStatus::Failed);
    assert_eq!(done.attempts, 3);
    assert!(done.last_error.is_some());

    let stats = manager.get_stats().await;
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.retries, 2);
    assert_eq!(stats.timeouts, 3);
    assert_eq!(stats.total_processed, 0);
    assert_eq!(stats.total_errors, 3);

    manager.stop().await;
}

#[tokio::test]
async fn test_job_succeeds_on_third_attempt() {
    let manager = JobManager::new(config(2, 10));
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    manager
        .register_job(
            JobDefinition::new(
                "fub_sync",
                "FUB Sync",
                handler_fn(move |ctx, _params| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        if ctx.attempt < 3 {
                            Err(SchedulerError::handler("FUB API returned 503"))
                        } else {
                            Ok(JobResult::success(JobParams::new())
                                .with_data("contacts_synced", json!(150)))
                        }
                    }
                }),
            )
            .with_max_retries(3)
            .with_retry_delay(Duration::from_millis(10)),
        )
        .await
        .unwrap();
    manager.start().await;

    let queued = manager.queue_job("fub_sync", JobParams::new()).await.unwrap();
    let done = wait_terminal(&manager, &queued.id).await;

    assert_eq!(done.status, ExecutionStatus::Completed);
    assert_eq!(done.attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(done.result.unwrap().data["contacts_synced"], json!(150));
    assert!(done.started_at.unwrap() <= done.finished_at.unwrap());

    manager.stop().await;
}

#[tokio::test]
async fn test_start_is_idempotent_and_stop_is_final() {
    let manager = JobManager::new(config(2, 10));
    manager.register_job(echo_job("echo")).await.unwrap();

    assert!(!manager.is_running());
    assert!(manager.start().await);
    assert!(!manager.start().await);
    assert!(manager.is_running());
    assert_eq!(manager.get_stats().await.worker_count, 2);

    manager.stop().await;
    manager.stop().await;
    assert!(!manager.is_running());
    assert!(!manager.start().await);

    let err = manager.queue_job("echo", JobParams::new()).await.unwrap_err();
    assert!(matches!(err, SchedulerError::ManagerStopped));
}

#[tokio::test]
async fn test_stop_cancels_queued_executions() {
    let manager = JobManager::new(config(1, 10));
    manager.register_job(echo_job("echo")).await.unwrap();

    // 未启动时入队的实例不会被执行
    let first = manager.queue_job("echo", JobParams::new()).await.unwrap();
    let second = manager.queue_job("echo", JobParams::new()).await.unwrap();

    manager.stop().await;

    for id in [&first.id, &second.id] {
        let execution = manager.get_execution(id).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Cancelled);
        assert_eq!(execution.attempts, 0);
    }
    let stats = manager.get_stats().await;
    assert_eq!(stats.cancelled, 2);
    assert_eq!(stats.queue_depth, 0);
}

#[tokio::test]
async fn test_stop_waits_for_running_execution() {
    let manager = JobManager::new(config(1, 10));
    manager
        .register_job(JobDefinition::new(
            "report",
            "Weekly Report",
            handler_fn(|_ctx, params| async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(JobResult::success(params))
            }),
        ))
        .await
        .unwrap();
    manager.start().await;

    let queued = manager.queue_job("report", JobParams::new()).await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), async {
        while manager.get_execution(&queued.id).await.unwrap().status != ExecutionStatus::Running {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    manager.stop().await;

    let execution = manager.get_execution(&queued.id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn test_trigger_schedule_uses_entry_parameters() {
    let manager = JobManager::new(config(1, 10));
    manager.register_job(echo_job("echo")).await.unwrap();

    let mut params = JobParams::new();
    params.insert("days_old".to_string(), json!(30));
    let schedule_id = manager
        .schedule_job("echo", "Nightly Cleanup", "0 2 * * *", params)
        .await
        .unwrap();
    let before = manager.get_schedule(&schedule_id).await.unwrap();

    manager.start().await;
    let queued = manager.trigger_schedule(&schedule_id).await.unwrap();
    let done = wait_terminal(&manager, &queued.id).await;

    assert_eq!(done.status, ExecutionStatus::Completed);
    assert_eq!(done.result.unwrap().data["days_old"], json!(30));

    let after = manager.get_schedule(&schedule_id).await.unwrap();
    assert_eq!(after.next_run, before.next_run);
    assert!(after.last_run.is_none());

    let err = manager.trigger_schedule("sched_missing").await.unwrap_err();
    assert!(matches!(err, SchedulerError::ScheduleNotFound { .. }));

    manager.stop().await;
}

#[tokio::test]
async fn test_disable_schedule_and_lookup_errors() {
    let manager = JobManager::new(config(1, 10));
    manager.register_job(echo_job("echo")).await.unwrap();
    let id = manager
        .schedule_job("echo", "Hourly", "@hourly", JobParams::new())
        .await
        .unwrap();

    let entry = manager.set_schedule_enabled(&id, false).await.unwrap();
    assert!(!entry.enabled);
    assert!(!manager.get_schedule(&id).await.unwrap().enabled);

    assert!(matches!(
        manager.set_schedule_enabled("sched_missing", true).await,
        Err(SchedulerError::ScheduleNotFound { .. })
    ));
    assert!(matches!(
        manager.get_execution("exec_missing").await,
        Err(SchedulerError::ExecutionNotFound { .. })
    ));
}

#[tokio::test]
async fn test_stats_reflect_processed_work() {
    let manager = JobManager::new(config(3, 50));
    manager.register_job(echo_job("echo")).await.unwrap();
    manager
        .register_job(
            JobDefinition::new(
                "broken",
                "Broken",
                handler_fn(|_ctx, _params| async move {
                    Err(SchedulerError::handler("connection refused"))
                }),
            )
            .with_max_retries(0),
        )
        .await
        .unwrap();
    manager.start().await;

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(manager.queue_job("echo", JobParams::new()).await.unwrap().id);
    }
    ids.push(manager.queue_job("broken", JobParams::new()).await.unwrap().id);
    for id in &ids {
        wait_terminal(&manager, id).await;
    }

    let stats = manager.get_stats().await;
    assert_eq!(stats.registered_jobs, 2);
    assert_eq!(stats.completed, 5);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.total_processed, 5);
    assert_eq!(stats.total_errors, 1);
    assert!(stats.running);

    let recent = manager.recent_executions(3).await;
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].id, ids[5]);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["worker_count"], json!(3));

    manager.stop().await;
}

#[tokio::test]
async fn test_disabled_schedule_cannot_be_triggered() {
    let manager = JobManager::new(config(1, 10));
    manager.register_job(echo_job("echo")).await.unwrap();
    let id = manager
        .schedule_job("echo", "Hourly", "@hourly", JobParams::new())
        .await
        .unwrap();
    manager.set_schedule_enabled(&id, false).await.unwrap();

    let err = manager.trigger_schedule(&id).await.unwrap_err();
    assert!(matches!(err, SchedulerError::ScheduleDisabled { .. }));
    assert_eq!(manager.get_stats().await.queue_depth, 0);
    assert!(manager.recent_executions(10).await.is_empty());

    manager.set_schedule_enabled(&id, true).await.unwrap();
    manager.trigger_schedule(&id).await.unwrap();
    assert_eq!(manager.get_stats().await.queue_depth, 1);
}

#[tokio::test]
async fn test_oversized_interval_is_rejected() {
    let manager = JobManager::new(config(1, 10));
    manager.register_job(echo_job("echo")).await.unwrap();

    for expr in ["@every 4294967295h", "@every 4294967295m"] {
        let err = manager
            .schedule_job("echo", "Too Far", expr, JobParams::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidSchedule { .. }), "{expr}");
    }
    assert!(manager.list_schedules().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_submissions_racing_stop_never_stay_pending() {
    let manager = Arc::new(JobManager::new(config(1, 1000)));
    manager.register_job(echo_job("echo")).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                let _ = manager.queue_job("echo", JobParams::new()).await;
                tokio::task::yield_now().await;
            }
        }));
    }
    tokio::task::yield_now().await;
    manager.stop().await;
    for handle in handles {
        handle.await.unwrap();
    }

    // 未启动的管理器不会执行任何实例，被接受的都必须已取消
    for execution in manager.recent_executions(1000).await {
        assert_eq!(execution.status, ExecutionStatus::Cancelled, "{}", execution.id);
    }
    assert_eq!(manager.get_stats().await.queue_depth, 0);
}

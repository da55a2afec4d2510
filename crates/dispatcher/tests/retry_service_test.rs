use std::time::Duration;

use jobs_core::models::{
    Execution, ExecutionSource, ExecutionStatus, JobDefinition, JobParams, JobResult,
};
use jobs_core::traits::handler_fn;
use jobs_core::ShutdownManager;
use jobs_dispatcher::{ExecutionDispatcher, RetryDecision, RetryService};

fn job(max_retries: u32, retry_delay: Duration) -> JobDefinition {
    JobDefinition::new(
        "analytics",
        "Analytics Aggregation",
        handler_fn(|_ctx, _params| async { Ok(JobResult::success(JobParams::new())) }),
    )
    .with_max_retries(max_retries)
    .with_retry_delay(retry_delay)
}

fn running_execution(attempts: u32) -> Execution {
    let mut execution = Execution::new("analytics", JobParams::new(), ExecutionSource::Manual);
    for _ in 0..attempts {
        execution.mark_running("worker-1");
    }
    execution
}

#[tokio::test(start_paused = true)]
async fn test_failure_with_retries_left_is_requeued_after_delay() {
    let dispatcher = ExecutionDispatcher::new(4, 100);
    let service = RetryService::new(dispatcher.clone(), ShutdownManager::new());
    let job = job(2, Duration::from_secs(30));
    let execution = running_execution(1);
    let id = execution.id.clone();

    let decision = service
        .handle_failure(execution, &job, "connection refused".to_string(), None)
        .await;
    let RetryDecision::Scheduled { delay, timer } = decision else {
        panic!("应安排重试");
    };
    assert_eq!(delay, Duration::from_secs(30));

    let stored = dispatcher.store.get(&id).await.unwrap();
    assert_eq!(stored.status, ExecutionStatus::Retrying);
    assert_eq!(stored.last_error.as_deref(), Some("connection refused"));
    assert!(dispatcher.queue.is_empty());

    timer.await.unwrap();

    let requeued = dispatcher.queue.recv().await.unwrap();
    assert_eq!(requeued.id, id);
    assert_eq!(requeued.status, ExecutionStatus::Pending);
    assert_eq!(requeued.attempts, 1);
    assert_eq!(dispatcher.metrics.snapshot().retries, 1);
}

#[tokio::test]
async fn test_exhausted_retries_mark_failed() {
    let dispatcher = ExecutionDispatcher::new(4, 100);
    let service = RetryService::new(dispatcher.clone(), ShutdownManager::new());
    let job = job(2, Duration::from_millis(10));
    let execution = running_execution(3);
    let id = execution.id.clone();

    let decision = service
        .handle_failure(
            execution,
            &job,
            "still failing".to_string(),
            Some(JobResult::failure("still failing")),
        )
        .await;
    assert!(!decision.is_scheduled());

    let stored = dispatcher.store.get(&id).await.unwrap();
    assert_eq!(stored.status, ExecutionStatus::Failed);
    assert_eq!(stored.attempts, 3);
    assert_eq!(stored.last_error.as_deref(), Some("still failing"));
    assert!(stored.finished_at.is_some());
    assert!(!stored.result.unwrap().success);
    assert_eq!(dispatcher.metrics.snapshot().failed, 1);
    assert!(dispatcher.queue.is_empty());
}

#[tokio::test]
async fn test_zero_retries_fails_immediately() {
    let dispatcher = ExecutionDispatcher::new(4, 100);
    let service = RetryService::new(dispatcher.clone(), ShutdownManager::new());
    let decision = service
        .handle_failure(
            running_execution(1),
            &job(0, Duration::from_secs(1)),
            "boom".to_string(),
            None,
        )
        .await;
    assert!(matches!(decision, RetryDecision::Exhausted));
}

#[tokio::test(start_paused = true)]
async fn test_retry_dropped_when_queue_full() {
    let dispatcher = ExecutionDispatcher::new(1, 100);
    let service = RetryService::new(dispatcher.clone(), ShutdownManager::new());
    let execution = running_execution(1);
    let id = execution.id.clone();

    let decision = service
        .handle_failure(execution, &job(3, Duration::from_secs(5)), "boom".to_string(), None)
        .await;

    // 重试等待期间队列被占满
    dispatcher
        .submit(Execution::new("analytics", JobParams::new(), ExecutionSource::Manual))
        .await
        .unwrap();

    let RetryDecision::Scheduled { timer, .. } = decision else {
        panic!("应安排重试");
    };
    timer.await.unwrap();

    let stored = dispatcher.store.get(&id).await.unwrap();
    assert_eq!(stored.status, ExecutionStatus::Failed);
    assert!(stored.last_error.unwrap().contains("retry dropped"));

    let snapshot = dispatcher.metrics.snapshot();
    assert_eq!(snapshot.dropped_retries, 1);
    assert_eq!(snapshot.failed, 1);
    assert_eq!(dispatcher.queue.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pending_retry_cancelled_on_shutdown() {
    let dispatcher = ExecutionDispatcher::new(4, 100);
    let shutdown = ShutdownManager::new();
    let service = RetryService::new(dispatcher.clone(), shutdown.clone());
    let execution = running_execution(1);
    let id = execution.id.clone();

    let decision = service
        .handle_failure(execution, &job(3, Duration::from_secs(60)), "boom".to_string(), None)
        .await;
    let RetryDecision::Scheduled { timer, .. } = decision else {
        panic!("应安排重试");
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    shutdown.shutdown().await;
    timer.await.unwrap();

    let stored = dispatcher.store.get(&id).await.unwrap();
    assert_eq!(stored.status, ExecutionStatus::Cancelled);
    assert!(dispatcher.queue.is_empty());
    assert_eq!(dispatcher.metrics.snapshot().cancelled, 1);
}

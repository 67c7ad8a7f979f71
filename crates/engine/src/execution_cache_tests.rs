use super::*;
use std::time::Duration;
use wfh_core::{DomainId, EventId, HistoryEvent, RunId, WorkflowId, WorkflowType};

fn identity() -> ExecutionIdentity {
    ExecutionIdentity::new(DomainId::new("dom"), WorkflowId::new("wf"), RunId::new())
}

fn sample_state(identity: &ExecutionIdentity) -> MutableState {
    let start = HistoryEvent::WorkflowExecutionStarted {
        workflow_type: WorkflowType { name: "Wf".into() },
        task_list: "tl".into(),
        input: Default::default(),
        execution_start_to_close_timeout_ms: 60_000,
        task_start_to_close_timeout_ms: 10_000,
        request_id: "req".into(),
        cron_schedule: None,
        retry_policy: None,
        attempt: 0,
        parent_workflow: None,
        continued_from_run_id: None,
        first_decision_task_backoff_seconds: 0,
    };
    #[allow(clippy::expect_used)]
    MutableState::new_from_start(identity.clone(), EventId::FIRST, 1_000, &start).expect("valid start event")
}

#[tokio::test]
async fn second_acquire_waits_for_first_release() {
    let cache = ExecutionCache::new(10);
    let identity = identity();

    let lease = cache.acquire(&identity, Duration::from_secs(5)).await.expect("first acquire");
    assert!(lease.get().is_none());
    drop(lease);

    let lease = cache.acquire(&identity, Duration::from_secs(5)).await.expect("second acquire after release");
    assert!(lease.get().is_none());
}

#[tokio::test]
async fn acquire_times_out_while_another_holder_is_active() {
    let cache = Arc::new(ExecutionCache::new(10));
    let identity = identity();

    let held = cache.acquire(&identity, Duration::from_secs(5)).await.expect("acquire lease");

    let err = cache
        .acquire(&identity, Duration::from_millis(20))
        .await
        .expect_err("lease is held elsewhere");
    assert!(matches!(err, HistoryError::Timeout(_)));
    drop(held);
}

#[tokio::test]
async fn clear_forces_next_acquire_to_see_no_cached_state() {
    let cache = ExecutionCache::new(10);
    let identity = identity();

    let mut lease = cache.acquire(&identity, Duration::from_secs(5)).await.expect("acquire");
    assert!(lease.get().is_none());
    lease.clear();
    drop(lease);

    let lease = cache.acquire(&identity, Duration::from_secs(5)).await.expect("reacquire");
    assert!(lease.get().is_none());
}

#[tokio::test]
async fn get_and_create_reports_cold_slot_with_no_cache_hit() {
    let cache = ExecutionCache::new(10);
    let identity = identity();
    let fresh = sample_state(&identity);

    let result = cache
        .get_and_create(&identity, Duration::from_secs(5), || async { Ok(fresh.clone()) })
        .await
        .expect("get_and_create");

    assert!(result.cache_hit.is_none(), "nothing was cached before this call");
    assert_eq!(result.fresh, fresh);
    assert_eq!(result.lease.get(), Some(&fresh), "lease now holds the freshly-loaded view");
}

#[tokio::test]
async fn get_and_create_surfaces_prior_cached_value_alongside_the_reload() {
    let cache = ExecutionCache::new(10);
    let identity = identity();
    let cached = sample_state(&identity);

    let mut lease = cache.acquire(&identity, Duration::from_secs(5)).await.expect("acquire");
    lease.set(cached.clone());
    drop(lease);

    let mut reloaded = sample_state(&identity);
    reloaded.execution_info.signal_count = 7;
    let reloaded_for_loader = reloaded.clone();

    let result = cache
        .get_and_create(&identity, Duration::from_secs(5), || async { Ok(reloaded_for_loader) })
        .await
        .expect("get_and_create");

    assert_eq!(result.cache_hit, Some(cached), "prior cached state is still reported");
    assert_eq!(result.fresh, reloaded);
    assert_eq!(result.lease.get(), Some(&reloaded), "lease is replaced with the freshly-loaded view");
}

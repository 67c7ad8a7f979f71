use super::*;
use wfh_core::{DomainId, SystemClock};
use wfh_storage::fakes::{
    FixedClusterMetadata, InMemoryDomainCache, InMemoryShard, InMemoryTimerQueueProcessor,
    InMemoryTransferQueueProcessor,
};
use wfh_storage::{Domain, DomainReplicationConfig};

fn coordinator(
    cluster: &str,
) -> (Arc<FailoverCoordinator>, Arc<InMemoryTransferQueueProcessor>, Arc<InMemoryTimerQueueProcessor>) {
    let shard = Arc::new(InMemoryShard::new(SystemClock));
    let transfer = Arc::new(InMemoryTransferQueueProcessor::new());
    let timer = Arc::new(InMemoryTimerQueueProcessor::new());
    let cluster_metadata = Arc::new(FixedClusterMetadata::new(cluster));
    let failover = FailoverCoordinator::new(shard, transfer.clone(), timer.clone(), cluster_metadata);
    (failover, transfer, timer)
}

fn global_domain(id: &str, active_cluster: &str, notification_version: i64) -> Domain {
    Domain {
        domain_id: DomainId::new(id),
        name: id.to_string(),
        replication: DomainReplicationConfig {
            is_global_domain: true,
            active_cluster_name: active_cluster.to_string(),
            clusters: vec!["cluster-a".to_string(), "cluster-b".to_string()],
        },
        failover_notification_version: notification_version,
        failover_version: notification_version,
    }
}

#[tokio::test]
async fn newly_active_global_domain_triggers_failover() {
    let (coordinator, transfer, timer) = coordinator("cluster-a");
    let domain = global_domain("dom-1", "cluster-a", 5);

    coordinator.handle_change(&[domain]).await;

    assert_eq!(transfer.received().len(), 1, "nudge task should reach the transfer processor");
    assert_eq!(timer.received().len(), 1, "nudge task should reach the timer processor");
    assert!(!transfer.is_locked(), "processors must be unlocked once the failover completes");
    assert!(!timer.is_locked());
    assert_eq!(
        coordinator.shard.get_domain_notification_version().await,
        6,
        "version advances one past the highest failover_notification_version observed"
    );
}

#[tokio::test]
async fn domain_active_elsewhere_is_not_a_failover() {
    let (coordinator, transfer, timer) = coordinator("cluster-a");
    let domain = global_domain("dom-1", "cluster-b", 5);

    coordinator.handle_change(&[domain]).await;

    assert!(transfer.received().is_empty());
    assert!(timer.received().is_empty());
    assert_eq!(coordinator.shard.get_domain_notification_version().await, 6, "version still advances");
}

#[tokio::test]
async fn non_global_domain_is_ignored() {
    let (coordinator, transfer, timer) = coordinator("cluster-a");
    let mut domain = global_domain("dom-1", "cluster-a", 5);
    domain.replication.is_global_domain = false;

    coordinator.handle_change(&[domain]).await;

    assert!(transfer.received().is_empty());
    assert!(timer.received().is_empty());
}

#[tokio::test]
async fn already_observed_version_does_not_refire() {
    let (coordinator, transfer, timer) = coordinator("cluster-a");
    coordinator.shard.update_domain_notification_version(10).await;
    let domain = global_domain("dom-1", "cluster-a", 3);

    coordinator.handle_change(&[domain]).await;

    assert!(transfer.received().is_empty());
    assert!(timer.received().is_empty());
    assert_eq!(coordinator.shard.get_domain_notification_version().await, 10, "stale version must not roll back");
}

#[tokio::test]
async fn repeating_the_same_domain_update_does_not_refire() {
    let (coordinator, transfer, timer) = coordinator("cluster-a");
    let domain = global_domain("dom-1", "cluster-a", 5);

    coordinator.handle_change(&[domain.clone()]).await;
    assert_eq!(transfer.received().len(), 1);
    assert_eq!(timer.received().len(), 1);

    coordinator.handle_change(&[domain]).await;
    assert_eq!(
        transfer.received().len(),
        1,
        "an identical failover_notification_version must not re-trigger a second failover cycle"
    );
    assert_eq!(timer.received().len(), 1);
}

#[tokio::test]
async fn register_bridges_sync_callback_to_async_handler() {
    let (coordinator, transfer, timer) = coordinator("cluster-a");
    let concrete = Arc::new(InMemoryDomainCache::new());
    let domain_cache: Arc<dyn wfh_storage::DomainCache> = concrete.clone();
    let handle = coordinator.register(&domain_cache);

    concrete.upsert(global_domain("dom-1", "cluster-a", 1));

    for _ in 0..50 {
        if !transfer.received().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    assert_eq!(transfer.received().len(), 1);
    assert_eq!(timer.received().len(), 1);
    handle.abort();
}

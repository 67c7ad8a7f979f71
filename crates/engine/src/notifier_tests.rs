use super::*;
use wfh_core::{DomainId, RunId, WorkflowId};

fn identity() -> ExecutionIdentity {
    ExecutionIdentity::new(DomainId::new("dom"), WorkflowId::new("wf"), RunId::new())
}

#[tokio::test]
async fn watcher_observes_notification_after_subscribe() {
    let notifier = HistoryEventNotifier::new();
    let identity = identity();
    let initial = NotifierState { next_event_id: EventId::FIRST, is_closed: false };
    let mut rx = notifier.watch(&identity, initial);

    let advanced = NotifierState { next_event_id: EventId::FIRST.next(), is_closed: false };
    notifier.notify(&identity, advanced);

    rx.changed().await.expect("sender still alive");
    assert_eq!(*rx.borrow(), advanced);
}

#[tokio::test]
async fn notify_with_no_subscriber_is_a_harmless_no_op() {
    let notifier = HistoryEventNotifier::new();
    let identity = identity();
    notifier.notify(&identity, NotifierState { next_event_id: EventId::FIRST, is_closed: false });
}

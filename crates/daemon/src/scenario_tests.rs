use super::*;

#[tokio::test]
async fn run_scenario_completes_the_workflow() {
    let outcome = run_scenario().await.expect("scenario runs to completion");

    assert_eq!(outcome.final_close_status, Some(CloseStatus::Completed));
    // Started, DecisionTaskScheduled, DecisionTaskStarted, DecisionTaskCompleted,
    // ActivityTaskScheduled, ActivityTaskStarted, ActivityTaskCompleted,
    // DecisionTaskScheduled, DecisionTaskStarted, DecisionTaskCompleted,
    // WorkflowExecutionCompleted: next_event_id lands past all eleven.
    assert!(outcome.final_next_event_id.0 > 10);
}

#[tokio::test]
async fn run_scenario_is_repeatable_across_independent_engines() {
    let first = run_scenario().await.expect("first run completes");
    let second = run_scenario().await.expect("second run completes");

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.final_next_event_id, second.final_next_event_id);
    assert_eq!(first.final_close_status, second.final_close_status);
}

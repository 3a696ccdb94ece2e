// ABOUTME: Integration tests for execution report generation
// ABOUTME: Verifies report snapshots agree with the live registry and survive re-parsing

use std::time::Duration;

use labforge::engine::{
    ExecutionReport, Orchestrator, OrchestratorConfig, RetryPolicy, TaskSpec, TaskStatus,
};

mod common;
use common::{failing, succeeding, Probe};

fn orchestrator() -> Orchestrator {
    Orchestrator::new(OrchestratorConfig {
        max_concurrent: 2,
        default_retry: RetryPolicy::no_retry(),
        poll_interval: Duration::from_millis(5),
        ..OrchestratorConfig::default()
    })
}

#[tokio::test]
async fn test_report_matches_live_registry_after_run() {
    let probe = Probe::new();
    let mut orch = orchestrator();

    orch.add_task(TaskSpec::new("ok-1", succeeding(&probe, "ok-1", &[])))
        .unwrap();
    orch.add_task(TaskSpec::new("ok-2", succeeding(&probe, "ok-2", &[])))
        .unwrap();
    orch.add_task(TaskSpec::new("bad", failing(&probe, "bad")))
        .unwrap();
    orch.add_task(TaskSpec::new("stranded", succeeding(&probe, "stranded", &[])).depends_on("bad"))
        .unwrap();

    orch.run().await;

    let report = orch.report();
    let reparsed = ExecutionReport::from_json(&report.to_json().unwrap()).unwrap();

    for status in [
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Skipped,
    ] {
        assert_eq!(
            reparsed.count_with_status(status),
            orch.graph().count_with_status(status),
            "mismatch for {:?}",
            status
        );
    }

    assert_eq!(reparsed.count_with_status(TaskStatus::Completed), 2);
    assert_eq!(reparsed.count_with_status(TaskStatus::Failed), 1);
    assert_eq!(reparsed.count_with_status(TaskStatus::Skipped), 1);
}

#[tokio::test]
async fn test_report_is_snapshot_not_view() {
    let probe = Probe::new();
    let mut orch = orchestrator();

    orch.add_task(TaskSpec::new("a", succeeding(&probe, "a", &[])))
        .unwrap();

    let before = orch.report();
    assert_eq!(before.tasks["a"].status, TaskStatus::Pending);

    orch.run().await;

    // the earlier snapshot is unchanged; a fresh one sees the result
    assert_eq!(before.tasks["a"].status, TaskStatus::Pending);
    assert_eq!(orch.report().tasks["a"].status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_report_fields_populated_for_executed_tasks() {
    let probe = Probe::new();
    let mut orch = orchestrator();

    orch.add_task(TaskSpec::new("a", succeeding(&probe, "a", &[])))
        .unwrap();
    orch.run().await;

    let report = orch.report();
    let entry = &report.tasks["a"];

    assert!(entry.start_time.is_some());
    assert!(entry.duration_seconds.is_some());
    assert!(entry.duration_seconds.unwrap() >= 0.0);
    assert_eq!(entry.attempts, 1);
    assert!(entry.error.is_none());
    assert!(report.generated_at <= chrono::Utc::now());
}

#[tokio::test]
async fn test_report_itemizes_every_failed_and_skipped_task() {
    let probe = Probe::new();
    let mut orch = orchestrator();

    orch.add_task(TaskSpec::new("bad", failing(&probe, "bad")))
        .unwrap();
    orch.add_task(TaskSpec::new("child", succeeding(&probe, "child", &[])).depends_on("bad"))
        .unwrap();
    orch.add_task(TaskSpec::new("grandchild", succeeding(&probe, "grandchild", &[])).depends_on("child"))
        .unwrap();

    orch.run().await;

    let report = orch.report();
    let mut problems = report.problem_tasks();
    problems.sort();
    assert_eq!(problems, vec!["bad", "child", "grandchild"]);

    let summary = report.render_summary();
    assert!(summary.contains("bad"));
    assert!(summary.contains("skipped"));
}

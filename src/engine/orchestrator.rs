// ABOUTME: Orchestration facade composing the task graph, scheduler, and rollback registry
// ABOUTME: Context object owning all engine state so multiple instances can coexist

use std::time::Duration;

use tracing::info;

use super::action::SharedAction;
use super::error::Result;
use super::graph::{TaskGraph, TaskSpec, TaskStatus};
use super::report::{ComponentStatus, ExecutionReport};
use super::retry::{RetryExecutor, RetryPolicy};
use super::rollback::{RollbackRegistry, SweepSummary};
use super::scheduler::{default_concurrency, RunSummary, Scheduler, SchedulerConfig};

/// Engine-wide defaults, each overridable per task at registration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_concurrent: usize,
    pub default_timeout: Duration,
    pub default_retry: RetryPolicy,
    pub rollback_timeout: Duration,
    pub poll_interval: Duration,
    pub progress_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_concurrency(),
            default_timeout: Duration::from_secs(600),
            default_retry: RetryPolicy::default(),
            rollback_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(25),
            progress_interval: Duration::from_secs(5),
        }
    }
}

/// Owns every registry for one orchestrated run. There is no process-global
/// state; independent orchestrators can run side by side under test.
///
/// Tasks and compensating actions are registered during a setup phase; the
/// graph is immutable once `run` starts. Rollback and cleanup are never
/// automatic — the caller decides after a failed run.
pub struct Orchestrator {
    graph: TaskGraph,
    rollback: RollbackRegistry,
    executor: RetryExecutor,
    scheduler: Scheduler,
    run_id: String,
    last_summary: Option<RunSummary>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        let executor = RetryExecutor::new(config.default_timeout);
        let scheduler = Scheduler::new(
            SchedulerConfig {
                max_concurrent: config.max_concurrent,
                poll_interval: config.poll_interval,
                progress_interval: config.progress_interval,
            },
            executor.clone(),
            config.default_retry.clone(),
        );

        Self {
            graph: TaskGraph::new(),
            rollback: RollbackRegistry::new(config.rollback_timeout),
            executor,
            scheduler,
            run_id: uuid::Uuid::new_v4().to_string(),
            last_summary: None,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Register a task. Fails fast on a duplicate id.
    pub fn add_task(&mut self, spec: TaskSpec) -> Result<()> {
        self.graph.add_task(spec)
    }

    pub fn register_rollback(&mut self, component: impl Into<String>, action: SharedAction) {
        self.rollback.register_rollback(component, action);
    }

    pub fn register_cleanup(&mut self, component: impl Into<String>, action: SharedAction) {
        self.rollback.register_cleanup(component, action);
    }

    pub fn register_teardown<F>(&mut self, resource_type: impl Into<String>, teardown: F)
    where
        F: Fn(&super::rollback::TrackedResource) -> SharedAction + Send + Sync + 'static,
    {
        self.rollback.register_teardown(resource_type, teardown);
    }

    pub fn track_resource(
        &mut self,
        resource_type: impl Into<String>,
        id: impl Into<String>,
        owning_component: impl Into<String>,
    ) {
        self.rollback.track_resource(resource_type, id, owning_component);
    }

    /// Drive the registered tasks to completion. Success iff zero tasks
    /// ended Failed or Skipped; callers map this to a process exit code.
    pub async fn run(&mut self) -> RunSummary {
        info!(run_id = %self.run_id, tasks = self.graph.len(), "orchestrator run starting");
        let summary = self.scheduler.run(&mut self.graph).await;
        self.last_summary = Some(summary.clone());
        summary
    }

    /// Snapshot the current task and component state.
    pub fn report(&self) -> ExecutionReport {
        let mut report = ExecutionReport::from_graph(&self.run_id, &self.graph);
        for (component, entry) in self.rollback.records() {
            report.add_component_entry(component, entry.clone());
        }
        report
    }

    /// Roll back a single component through its registered action.
    pub async fn rollback(&mut self, component: &str) -> Result<ComponentStatus> {
        self.rollback.rollback(component, &self.executor).await
    }

    /// Roll back components sequentially in the caller-specified order.
    pub async fn rollback_many(
        &mut self,
        components: &[&str],
    ) -> Vec<(String, Result<ComponentStatus>)> {
        self.rollback.rollback_many(components, &self.executor).await
    }

    /// Run a component's registered cleanup action.
    pub async fn cleanup(&mut self, component: &str) -> Result<ComponentStatus> {
        self.rollback.cleanup(component, &self.executor).await
    }

    /// Best-effort teardown of every tracked resource.
    pub async fn cleanup_tracked_resources(&mut self) -> SweepSummary {
        self.rollback.cleanup_tracked_resources(&self.executor).await
    }

    /// Ids of tasks that ended Failed, for rollback decisions after a run.
    pub fn failed_tasks(&self) -> Vec<String> {
        self.graph
            .entries()
            .filter(|t| t.status == TaskStatus::Failed)
            .map(|t| t.id.clone())
            .collect()
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(OrchestratorConfig::default())
    }
}

// ABOUTME: Dependency-ordered parallel scheduler with a concurrency bound
// ABOUTME: Drives the task graph to completion, cascading skips across failed dependency chains

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use super::error::EngineError;
use super::graph::{TaskGraph, TaskStatus};
use super::retry::{AttemptReport, RetryExecutor, RetryPolicy};

/// Policy default for the concurrency bound: detected core count clamped to
/// [1, 8]. Callers may configure any bound they like.
pub fn default_concurrency() -> usize {
    num_cpus::get().clamp(1, 8)
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_concurrent: usize,
    pub poll_interval: Duration,
    pub progress_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_concurrency(),
            poll_interval: Duration::from_millis(25),
            progress_interval: Duration::from_secs(5),
        }
    }
}

/// Aggregate result of one scheduler run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration: Duration,
}

impl RunSummary {
    /// Success iff zero tasks ended Failed or Skipped.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} completed, {} failed, {} skipped in {:.1}s",
            self.completed,
            self.total,
            self.failed,
            self.skipped,
            self.duration.as_secs_f64()
        )
    }
}

/// Drives a task graph to completion under the configured concurrency bound.
///
/// A single orchestrating loop owns every status transition; spawned actions
/// never touch the graph directly, so the registry needs no locking.
pub struct Scheduler {
    config: SchedulerConfig,
    executor: RetryExecutor,
    default_retry: RetryPolicy,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, executor: RetryExecutor, default_retry: RetryPolicy) -> Self {
        Self {
            config,
            executor,
            default_retry,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.config.max_concurrent
    }

    /// Run every task in the graph, honoring dependencies and the
    /// concurrency bound. Tasks whose dependencies end Failed or Skipped are
    /// marked Skipped without their action ever being invoked; an
    /// unreachable remainder (dependency cycle) is likewise skipped.
    pub async fn run(&self, graph: &mut TaskGraph) -> RunSummary {
        let started = Instant::now();
        let total = graph.len();
        let mut running: HashMap<String, JoinHandle<AttemptReport>> = HashMap::new();
        let mut last_progress = Instant::now();

        info!(
            total,
            max_concurrent = self.config.max_concurrent,
            "starting scheduler run"
        );

        loop {
            // Cascade skips: any Pending task behind a Failed/Skipped
            // dependency will never become ready.
            for id in graph.pending_tasks() {
                if graph.has_failed_dependency(&id) {
                    let reason = match graph.failed_dependency_of(&id) {
                        Some(dependency) => EngineError::DependencyUnsatisfied {
                            task_id: id.clone(),
                            dependency,
                        }
                        .to_string(),
                        None => "dependency failed".to_string(),
                    };
                    warn!(task = %id, %reason, "skipping task");
                    graph.mark(&id, TaskStatus::Skipped);
                    graph.record_outcome(&id, 0, Some(reason));
                }
            }

            // Launch ready tasks up to the bound.
            if running.len() < self.config.max_concurrent {
                for id in graph.ready_tasks() {
                    if running.len() >= self.config.max_concurrent {
                        break;
                    }
                    let handle = self.spawn_task(graph, &id);
                    running.insert(id, handle);
                }
            }

            // Reap finished handles; all graph writes stay on this loop.
            let finished: Vec<String> = running
                .iter()
                .filter(|(_, handle)| handle.is_finished())
                .map(|(id, _)| id.clone())
                .collect();

            for id in finished {
                let handle = running.remove(&id).expect("finished handle present");
                match handle.await {
                    Ok(report) => {
                        let status = if report.is_success() {
                            TaskStatus::Completed
                        } else {
                            TaskStatus::Failed
                        };
                        debug!(task = %id, %status, attempts = report.attempts, "task finished");
                        graph.mark(&id, status);
                        let error = report.to_error(&id).map(|e| e.to_string());
                        graph.record_outcome(&id, report.attempts, error);
                    }
                    Err(join_error) => {
                        error!(task = %id, "task panicked: {}", join_error);
                        graph.mark(&id, TaskStatus::Failed);
                        graph.record_outcome(&id, 0, Some(format!("panic: {}", join_error)));
                    }
                }
            }

            if graph.terminal_count() == total {
                break;
            }

            // Nothing running and nothing eligible: the remainder is a
            // dependency cycle and can never start.
            if running.is_empty() && graph.ready_tasks().is_empty() {
                let stranded = graph.pending_tasks();
                let unreachable: Vec<String> = stranded
                    .into_iter()
                    .filter(|id| !graph.has_failed_dependency(id))
                    .collect();
                if !unreachable.is_empty() {
                    warn!(tasks = ?unreachable, "unreachable tasks, marking skipped");
                    for id in unreachable {
                        graph.mark(&id, TaskStatus::Skipped);
                        graph.record_outcome(&id, 0, Some("unreachable".to_string()));
                    }
                }
                continue;
            }

            if last_progress.elapsed() >= self.config.progress_interval {
                info!(
                    completed = graph.count_with_status(TaskStatus::Completed),
                    failed = graph.count_with_status(TaskStatus::Failed),
                    skipped = graph.count_with_status(TaskStatus::Skipped),
                    running = running.len(),
                    total,
                    "progress"
                );
                last_progress = Instant::now();
            }

            sleep(self.config.poll_interval).await;
        }

        let summary = RunSummary {
            total,
            completed: graph.count_with_status(TaskStatus::Completed),
            failed: graph.count_with_status(TaskStatus::Failed),
            skipped: graph.count_with_status(TaskStatus::Skipped),
            duration: started.elapsed(),
        };

        if summary.is_success() {
            info!(%summary, "scheduler run succeeded");
        } else {
            error!(%summary, "scheduler run finished with failures");
        }

        summary
    }

    fn spawn_task(&self, graph: &mut TaskGraph, id: &str) -> JoinHandle<AttemptReport> {
        graph.mark(id, TaskStatus::Running);

        let entry = graph.get(id).expect("spawning known task");
        let action = entry.action();
        let policy = entry
            .retry_policy
            .clone()
            .unwrap_or_else(|| self.default_retry.clone());
        let timeout = entry.timeout;
        let description = entry.description.clone();
        let executor = self.executor.clone();

        info!(task = %id, "starting task");

        tokio::spawn(async move {
            executor
                .execute_with_retry(action.as_ref(), &policy, timeout, &description)
                .await
        })
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(
            SchedulerConfig::default(),
            RetryExecutor::default(),
            RetryPolicy::default(),
        )
    }
}

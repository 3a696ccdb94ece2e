// ABOUTME: Task graph registry holding task definitions and runtime status
// ABOUTME: Computes readiness from dependency status and enforces the task state machine

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::action::SharedAction;
use super::error::{EngineError, Result};
use super::retry::RetryPolicy;

/// Terminal and in-flight task states.
///
/// Legal transitions:
/// - `Pending` -> `Running`
/// - `Running` -> `Completed`
/// - `Running` -> `Failed`
/// - `Pending` -> `Skipped` (a dependency ended Failed or Skipped)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped
        )
    }

    /// True for terminal states that block dependents.
    pub fn blocks_dependents(&self) -> bool {
        matches!(self, TaskStatus::Failed | TaskStatus::Skipped)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Immutable task definition supplied during the setup phase.
pub struct TaskSpec {
    pub id: String,
    pub action: SharedAction,
    pub description: String,
    pub dependencies: Vec<String>,
    pub timeout: Option<Duration>,
    pub retry_policy: Option<RetryPolicy>,
    /// When true (the default), a dependency ending Failed or Skipped marks
    /// this task Skipped. When false the task runs best-effort once all its
    /// dependencies are terminal, whatever their outcome.
    pub skip_on_dependency_failure: bool,
}

impl TaskSpec {
    pub fn new(id: impl Into<String>, action: SharedAction) -> Self {
        let id = id.into();
        Self {
            description: id.clone(),
            id,
            action,
            dependencies: Vec::new(),
            timeout: None,
            retry_policy: None,
            skip_on_dependency_failure: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn run_on_dependency_failure(mut self) -> Self {
        self.skip_on_dependency_failure = false;
        self
    }
}

/// A registered task plus its runtime state.
pub struct TaskEntry {
    pub id: String,
    pub action: SharedAction,
    pub description: String,
    pub dependencies: Vec<String>,
    pub timeout: Option<Duration>,
    pub retry_policy: Option<RetryPolicy>,
    pub skip_on_dependency_failure: bool,
    pub status: TaskStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub error: Option<String>,
}

impl TaskEntry {
    fn from_spec(spec: TaskSpec) -> Self {
        Self {
            id: spec.id,
            action: spec.action,
            description: spec.description,
            dependencies: spec.dependencies,
            timeout: spec.timeout,
            retry_policy: spec.retry_policy,
            skip_on_dependency_failure: spec.skip_on_dependency_failure,
            status: TaskStatus::Pending,
            start_time: None,
            end_time: None,
            attempts: 0,
            error: None,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => (end - start).to_std().ok(),
            _ => None,
        }
    }

    pub fn action(&self) -> SharedAction {
        Arc::clone(&self.action)
    }
}

/// Registry of task definitions and their runtime status. All writes happen
/// on the orchestrating thread; no interior locking is needed.
#[derive(Default)]
pub struct TaskGraph {
    tasks: IndexMap<String, TaskEntry>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. Duplicate ids fail fast before any execution starts.
    pub fn add_task(&mut self, spec: TaskSpec) -> Result<()> {
        if self.tasks.contains_key(&spec.id) {
            return Err(EngineError::Registration {
                task_id: spec.id,
            });
        }
        self.tasks.insert(spec.id.clone(), TaskEntry::from_spec(spec));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TaskEntry> {
        self.tasks.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &TaskEntry> {
        self.tasks.values()
    }

    pub fn status(&self, id: &str) -> Option<TaskStatus> {
        self.tasks.get(id).map(|t| t.status)
    }

    /// True iff every dependency of `id` is Completed. For tasks opting out
    /// of skip-on-failure, true once every dependency is terminal.
    pub fn is_ready(&self, id: &str) -> bool {
        let Some(task) = self.tasks.get(id) else {
            return false;
        };

        task.dependencies.iter().all(|dep| {
            match self.tasks.get(dep).map(|t| t.status) {
                Some(TaskStatus::Completed) => true,
                Some(status) if !task.skip_on_dependency_failure => status.is_terminal(),
                _ => false,
            }
        })
    }

    /// True iff some dependency of `id` ended Failed or Skipped, which (for
    /// tasks with the default policy) makes `id` unreachable.
    pub fn has_failed_dependency(&self, id: &str) -> bool {
        let Some(task) = self.tasks.get(id) else {
            return false;
        };

        if !task.skip_on_dependency_failure {
            return false;
        }

        task.dependencies.iter().any(|dep| {
            self.tasks
                .get(dep)
                .map(|t| t.status.blocks_dependents())
                .unwrap_or(false)
        })
    }

    /// First dependency of `id` that ended Failed or Skipped, for diagnostics.
    pub fn failed_dependency_of(&self, id: &str) -> Option<String> {
        let task = self.tasks.get(id)?;
        task.dependencies
            .iter()
            .find(|dep| {
                self.tasks
                    .get(dep.as_str())
                    .map(|t| t.status.blocks_dependents())
                    .unwrap_or(false)
            })
            .cloned()
    }

    /// Ids of Pending tasks whose dependencies are satisfied.
    pub fn ready_tasks(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|(id, task)| task.status == TaskStatus::Pending && self.is_ready(id))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Ids of Pending tasks, in registration order.
    pub fn pending_tasks(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|(_, task)| task.status == TaskStatus::Pending)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn count_with_status(&self, status: TaskStatus) -> usize {
        self.tasks.values().filter(|t| t.status == status).count()
    }

    pub fn terminal_count(&self) -> usize {
        self.tasks.values().filter(|t| t.status.is_terminal()).count()
    }

    /// Transition a task to `status`, stamping start/end times.
    ///
    /// Illegal transitions are scheduler bugs and panic.
    pub fn mark(&mut self, id: &str, status: TaskStatus) {
        let task = self
            .tasks
            .get_mut(id)
            .unwrap_or_else(|| panic!("mark on unknown task '{}'", id));

        let legal = matches!(
            (task.status, status),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
                | (TaskStatus::Pending, TaskStatus::Skipped)
        );
        assert!(
            legal,
            "illegal task transition for '{}': {} -> {}",
            id, task.status, status
        );

        match status {
            TaskStatus::Running => task.start_time = Some(Utc::now()),
            _ if status.is_terminal() => task.end_time = Some(Utc::now()),
            _ => {}
        }
        task.status = status;
    }

    pub fn record_outcome(&mut self, id: &str, attempts: u32, error: Option<String>) {
        if let Some(task) = self.tasks.get_mut(id) {
            task.attempts = attempts;
            task.error = error;
        }
    }

    /// Aggregate success: every task ended Completed.
    pub fn all_completed(&self) -> bool {
        self.tasks
            .values()
            .all(|t| t.status == TaskStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::action::{ActionOutcome, FnAction};

    fn noop() -> SharedAction {
        FnAction::shared(|| async { ActionOutcome::Success })
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut graph = TaskGraph::new();
        graph.add_task(TaskSpec::new("a", noop())).unwrap();

        let err = graph.add_task(TaskSpec::new("a", noop())).unwrap_err();
        assert!(matches!(err, EngineError::Registration { task_id } if task_id == "a"));
    }

    #[test]
    fn test_readiness_requires_completed_deps() {
        let mut graph = TaskGraph::new();
        graph.add_task(TaskSpec::new("a", noop())).unwrap();
        graph
            .add_task(TaskSpec::new("b", noop()).depends_on("a"))
            .unwrap();

        assert!(graph.is_ready("a"));
        assert!(!graph.is_ready("b"));

        graph.mark("a", TaskStatus::Running);
        assert!(!graph.is_ready("b"));

        graph.mark("a", TaskStatus::Completed);
        assert!(graph.is_ready("b"));
    }

    #[test]
    fn test_failed_dependency_blocks_default_tasks() {
        let mut graph = TaskGraph::new();
        graph.add_task(TaskSpec::new("a", noop())).unwrap();
        graph
            .add_task(TaskSpec::new("b", noop()).depends_on("a"))
            .unwrap();

        graph.mark("a", TaskStatus::Running);
        graph.mark("a", TaskStatus::Failed);

        assert!(!graph.is_ready("b"));
        assert!(graph.has_failed_dependency("b"));
    }

    #[test]
    fn test_best_effort_task_ready_on_terminal_deps() {
        let mut graph = TaskGraph::new();
        graph.add_task(TaskSpec::new("a", noop())).unwrap();
        graph
            .add_task(
                TaskSpec::new("b", noop())
                    .depends_on("a")
                    .run_on_dependency_failure(),
            )
            .unwrap();

        graph.mark("a", TaskStatus::Running);
        graph.mark("a", TaskStatus::Failed);

        assert!(graph.is_ready("b"));
        assert!(!graph.has_failed_dependency("b"));
    }

    #[test]
    fn test_ready_tasks_in_registration_order() {
        let mut graph = TaskGraph::new();
        graph.add_task(TaskSpec::new("c", noop())).unwrap();
        graph.add_task(TaskSpec::new("a", noop())).unwrap();
        graph
            .add_task(TaskSpec::new("b", noop()).depends_on("c"))
            .unwrap();

        assert_eq!(graph.ready_tasks(), vec!["c".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_mark_stamps_times() {
        let mut graph = TaskGraph::new();
        graph.add_task(TaskSpec::new("a", noop())).unwrap();

        graph.mark("a", TaskStatus::Running);
        assert!(graph.get("a").unwrap().start_time.is_some());
        assert!(graph.get("a").unwrap().end_time.is_none());

        graph.mark("a", TaskStatus::Completed);
        assert!(graph.get("a").unwrap().end_time.is_some());
        assert!(graph.get("a").unwrap().duration().is_some());
    }

    #[test]
    #[should_panic(expected = "illegal task transition")]
    fn test_illegal_transition_panics() {
        let mut graph = TaskGraph::new();
        graph.add_task(TaskSpec::new("a", noop())).unwrap();
        graph.mark("a", TaskStatus::Completed);
    }

    #[test]
    #[should_panic(expected = "illegal task transition")]
    fn test_running_to_skipped_panics() {
        let mut graph = TaskGraph::new();
        graph.add_task(TaskSpec::new("a", noop())).unwrap();
        graph.mark("a", TaskStatus::Running);
        graph.mark("a", TaskStatus::Skipped);
    }

    #[test]
    fn test_status_counts() {
        let mut graph = TaskGraph::new();
        graph.add_task(TaskSpec::new("a", noop())).unwrap();
        graph.add_task(TaskSpec::new("b", noop())).unwrap();

        graph.mark("a", TaskStatus::Running);
        graph.mark("a", TaskStatus::Completed);

        assert_eq!(graph.count_with_status(TaskStatus::Completed), 1);
        assert_eq!(graph.count_with_status(TaskStatus::Pending), 1);
        assert_eq!(graph.terminal_count(), 1);
        assert!(!graph.all_completed());
    }
}

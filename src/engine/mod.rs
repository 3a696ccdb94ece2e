// ABOUTME: Task orchestration engine module
// ABOUTME: Actions, retry execution, task graph, parallel scheduling, rollback, and reporting

pub mod action;
pub mod error;
pub mod graph;
pub mod orchestrator;
pub mod report;
pub mod retry;
pub mod rollback;
pub mod scheduler;

pub use action::{Action, ActionOutcome, CommandAction, FnAction, SharedAction};
pub use error::{EngineError, Result};
pub use graph::{TaskGraph, TaskSpec, TaskStatus};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use report::{ComponentStatus, ExecutionReport};
pub use retry::{AttemptReport, RetryExecutor, RetryPolicy};
pub use rollback::{RollbackRegistry, SweepSummary, TrackedResource};
pub use scheduler::{default_concurrency, RunSummary, Scheduler, SchedulerConfig};

// ABOUTME: Main library module for the labforge orchestration engine
// ABOUTME: Exports the engine, plan, and CLI modules and the public API

pub mod cli;
pub mod engine;
pub mod plan;

// Re-export commonly used types
pub use cli::{App, Args, Config};
pub use engine::{
    Action, ActionOutcome, CommandAction, EngineError, ExecutionReport, FnAction, Orchestrator,
    OrchestratorConfig, RetryPolicy, RunSummary, TaskSpec, TaskStatus,
};
pub use plan::Plan;

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

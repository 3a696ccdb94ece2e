// ABOUTME: Error types for the orchestration engine
// ABOUTME: Covers action failures, timeouts, registration, and rollback errors

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("action failed: {description} - {message}")]
    ActionFailure { description: String, message: String },

    #[error("action timed out: {description} - exceeded {timeout:?} on attempt {attempt}")]
    ActionTimeout {
        description: String,
        timeout: Duration,
        attempt: u32,
    },

    #[error("dependency unsatisfied: task '{task_id}' requires '{dependency}'")]
    DependencyUnsatisfied { task_id: String, dependency: String },

    #[error("rollback failed for component '{component}': {message}")]
    RollbackFailure { component: String, message: String },

    #[error("duplicate task id: '{task_id}'")]
    Registration { task_id: String },

    #[error("no rollback registered for component '{component}'")]
    RollbackNotRegistered { component: String },

    #[error("no cleanup registered for component '{component}'")]
    CleanupNotRegistered { component: String },

    #[error("task '{task_id}' depends on unknown task '{dependency}'")]
    UnknownDependency { task_id: String, dependency: String },

    #[error("circular dependency detected involving: {tasks:?}")]
    CircularDependency { tasks: Vec<String> },

    #[error("invalid plan: {message}")]
    InvalidPlan { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

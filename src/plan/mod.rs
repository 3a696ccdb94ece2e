// ABOUTME: Declarative plan parsing for command-driven orchestration
// ABOUTME: Loads YAML plans of tasks, rollbacks, and defaults into engine registrations

pub mod validation;

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::engine::{
    CommandAction, EngineError, Orchestrator, OrchestratorConfig, Result, RetryPolicy, TaskSpec,
};

fn default_version() -> String {
    "1".to_string()
}

fn default_true() -> bool {
    true
}

/// A declarative plan: named command tasks with dependencies plus optional
/// per-component rollback and cleanup commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub defaults: PlanDefaults,
    pub tasks: IndexMap<String, PlanTask>,
    #[serde(default)]
    pub components: HashMap<String, PlanComponent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlanDefaults {
    pub max_concurrent: Option<usize>,
    pub timeout_seconds: Option<u64>,
    pub max_attempts: Option<u32>,
    pub backoff_multiplier: Option<f64>,
    pub initial_delay_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanTask {
    pub description: Option<String>,
    pub command: PlanCommand,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub timeout_seconds: Option<u64>,
    pub max_attempts: Option<u32>,
    pub backoff_multiplier: Option<f64>,
    pub initial_delay_seconds: Option<u64>,
    #[serde(default = "default_true")]
    pub skip_on_dependency_failure: bool,
}

/// Typed program + arguments; never shell-evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlanComponent {
    pub rollback: Option<PlanCommand>,
    pub cleanup: Option<PlanCommand>,
}

impl Plan {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let plan: Plan = serde_yaml::from_str(content)?;

        if plan.name.trim().is_empty() {
            return Err(EngineError::InvalidPlan {
                message: "plan name is empty".to_string(),
            });
        }
        if plan.tasks.is_empty() {
            return Err(EngineError::InvalidPlan {
                message: "plan contains no tasks".to_string(),
            });
        }

        validation::validate(&plan)?;
        Ok(plan)
    }

    /// Retry policy a task resolves to. Each field falls back independently
    /// through the plan defaults to the engine defaults; a policy is built
    /// whenever any retry field is set at either level, so a task stating
    /// only a backoff shape still gets it.
    fn retry_policy_for(&self, task: &PlanTask) -> Option<RetryPolicy> {
        let max_attempts = task.max_attempts.or(self.defaults.max_attempts);
        let initial_delay = task
            .initial_delay_seconds
            .or(self.defaults.initial_delay_seconds);
        let backoff_multiplier = task
            .backoff_multiplier
            .or(self.defaults.backoff_multiplier);

        if max_attempts.is_none() && initial_delay.is_none() && backoff_multiplier.is_none() {
            return None;
        }

        let base = RetryPolicy::default();
        Some(RetryPolicy {
            max_attempts: max_attempts.unwrap_or(base.max_attempts),
            initial_delay: initial_delay
                .map(Duration::from_secs)
                .unwrap_or(base.initial_delay),
            backoff_multiplier: backoff_multiplier.unwrap_or(base.backoff_multiplier),
            max_delay: base.max_delay,
        })
    }

    /// Build a fully registered orchestrator from this plan.
    pub fn build_orchestrator(&self, mut config: OrchestratorConfig) -> Result<Orchestrator> {
        if let Some(max_concurrent) = self.defaults.max_concurrent {
            config.max_concurrent = max_concurrent.max(1);
        }
        if let Some(timeout) = self.defaults.timeout_seconds {
            config.default_timeout = Duration::from_secs(timeout);
        }

        let mut orchestrator = Orchestrator::new(config);

        for (id, task) in &self.tasks {
            let action = CommandAction::shared(task.command.program.clone(), task.command.args.clone());
            let mut spec = TaskSpec::new(id.clone(), action)
                .with_description(task.description.clone().unwrap_or_else(|| id.clone()))
                .with_dependencies(task.depends_on.clone());

            if let Some(timeout) = task.timeout_seconds {
                spec = spec.with_timeout(Duration::from_secs(timeout));
            }
            if let Some(policy) = self.retry_policy_for(task) {
                spec = spec.with_retry_policy(policy);
            }
            if !task.skip_on_dependency_failure {
                spec = spec.run_on_dependency_failure();
            }

            orchestrator.add_task(spec)?;
        }

        for (name, component) in &self.components {
            if let Some(rollback) = &component.rollback {
                orchestrator.register_rollback(
                    name.clone(),
                    CommandAction::shared(rollback.program.clone(), rollback.args.clone()),
                );
            }
            if let Some(cleanup) = &component.cleanup {
                orchestrator.register_cleanup(
                    name.clone(),
                    CommandAction::shared(cleanup.program.clone(), cleanup.args.clone()),
                );
            }
        }

        Ok(orchestrator)
    }
}

// ABOUTME: Execution report generation and serialization
// ABOUTME: Read-only snapshot of per-task and per-component status for downstream consumers

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::graph::{TaskGraph, TaskStatus};

/// Terminal outcome of a compensating action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    RolledBack,
    RollbackFailed,
    CleanedUp,
    CleanupFailed,
}

impl std::fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentStatus::RolledBack => write!(f, "rolled_back"),
            ComponentStatus::RollbackFailed => write!(f, "rollback_failed"),
            ComponentStatus::CleanedUp => write!(f, "cleaned_up"),
            ComponentStatus::CleanupFailed => write!(f, "cleanup_failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReportEntry {
    pub status: TaskStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentReportEntry {
    pub status: ComponentStatus,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Point-in-time snapshot of a run. Generated on demand; never written back
/// to the live registries.
///
/// A component may appear with several entries (a rollback and a later
/// cleanup, say); all of them are kept in invocation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub generated_at: DateTime<Utc>,
    pub run_id: String,
    pub tasks: IndexMap<String, TaskReportEntry>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub components: IndexMap<String, Vec<ComponentReportEntry>>,
}

impl ExecutionReport {
    pub fn from_graph(run_id: &str, graph: &TaskGraph) -> Self {
        let tasks = graph
            .entries()
            .map(|task| {
                (
                    task.id.clone(),
                    TaskReportEntry {
                        status: task.status,
                        start_time: task.start_time,
                        duration_seconds: task.duration().map(|d| d.as_secs_f64()),
                        attempts: task.attempts,
                        error: task.error.clone(),
                    },
                )
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            run_id: run_id.to_string(),
            tasks,
            components: IndexMap::new(),
        }
    }

    pub fn add_component_entry(&mut self, component: &str, entry: ComponentReportEntry) {
        self.components
            .entry(component.to_string())
            .or_default()
            .push(entry);
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn count_with_status(&self, status: TaskStatus) -> usize {
        self.tasks.values().filter(|e| e.status == status).count()
    }

    /// Ids of every task that ended Failed or Skipped. The report itemizes
    /// these so a run never claims silent partial success.
    pub fn problem_tasks(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|(_, e)| matches!(e.status, TaskStatus::Failed | TaskStatus::Skipped))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Human-readable summary for terminal delivery.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Execution report (run {}) generated at {}\n",
            self.run_id,
            self.generated_at.to_rfc3339()
        ));

        for (id, entry) in &self.tasks {
            let duration = entry
                .duration_seconds
                .map(|d| format!("{:.2}s", d))
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!("  task {:<24} {:>9}  {}\n", id, entry.status.to_string(), duration));
            if let Some(error) = &entry.error {
                out.push_str(&format!("      error: {}\n", error));
            }
        }

        for (name, entries) in &self.components {
            for entry in entries {
                out.push_str(&format!(
                    "  component {:<19} {:>9}  {:.2}s\n",
                    name, entry.status.to_string(), entry.duration_seconds
                ));
            }
        }

        let failed = self.count_with_status(TaskStatus::Failed);
        let skipped = self.count_with_status(TaskStatus::Skipped);
        out.push_str(&format!(
            "  {} tasks, {} completed, {} failed, {} skipped\n",
            self.tasks.len(),
            self.count_with_status(TaskStatus::Completed),
            failed,
            skipped
        ));

        out
    }
}

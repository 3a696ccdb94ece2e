// ABOUTME: Command implementations for the labforge CLI
// ABOUTME: Handles execution of the run and validate commands

use anyhow::Result;
use std::path::PathBuf;
use tracing::{info, warn};

use super::config::Config;
use crate::engine::{ComponentStatus, EngineError, ExecutionReport};
use crate::plan::Plan;

/// Execute a plan. Returns an error on any failed or skipped task so the
/// process exits non-zero.
pub async fn run_plan(
    plan_path: PathBuf,
    max_concurrent: Option<usize>,
    output: Option<PathBuf>,
    rollback_components: Vec<String>,
    config: &Config,
) -> Result<()> {
    info!("loading plan: {}", plan_path.display());
    let plan = Plan::from_file(&plan_path).await?;

    let mut engine_config = config.orchestrator_config();
    if let Some(max_concurrent) = max_concurrent {
        engine_config.max_concurrent = max_concurrent.max(1);
    }

    let mut orchestrator = plan.build_orchestrator(engine_config)?;
    let summary = orchestrator.run().await;

    if !summary.is_success() && !rollback_components.is_empty() {
        let names: Vec<&str> = rollback_components.iter().map(String::as_str).collect();
        warn!(components = ?names, "run failed, rolling back");
        for (component, outcome) in orchestrator.rollback_many(&names).await {
            match outcome {
                Ok(ComponentStatus::RollbackFailed) => {
                    let e = EngineError::RollbackFailure {
                        component: component.clone(),
                        message: "compensating action failed".to_string(),
                    };
                    warn!(component = %component, "{}", e);
                }
                Ok(_) => {}
                Err(e) => warn!(component = %component, "rollback problem: {}", e),
            }
        }
    }

    let report = orchestrator.report();
    if let Some(output_path) = output {
        tokio::fs::write(&output_path, report.to_json()?).await?;
        info!("report written to {}", output_path.display());
    }

    print!("{}", report.render_summary());

    if summary.is_success() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("plan '{}' failed: {}", plan.name, summary))
    }
}

/// Validate a plan file without executing anything.
pub async fn validate_plan(plan_path: PathBuf) -> Result<()> {
    info!("validating plan: {}", plan_path.display());
    let plan = Plan::from_file(&plan_path).await?;

    println!("plan '{}' is valid", plan.name);
    println!("  tasks: {}", plan.tasks.len());
    println!("  components: {}", plan.components.len());

    Ok(())
}

/// Re-render a report previously written by `run --output`.
pub async fn show_report(report_path: PathBuf) -> Result<()> {
    let json = tokio::fs::read_to_string(&report_path).await?;
    let report = ExecutionReport::from_json(&json)?;

    print!("{}", report.render_summary());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TaskGraph;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_show_report_reads_written_json() {
        let report = ExecutionReport::from_graph("run-x", &TaskGraph::new());

        let dir = tempdir().unwrap();
        let path = dir.path().join("report.json");
        tokio::fs::write(&path, report.to_json().unwrap())
            .await
            .unwrap();

        show_report(path).await.unwrap();
    }

    #[tokio::test]
    async fn test_validate_rejects_missing_file() {
        let result = validate_plan(PathBuf::from("/nonexistent/plan.yaml")).await;
        assert!(result.is_err());
    }
}

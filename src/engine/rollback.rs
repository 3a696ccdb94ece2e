// ABOUTME: Rollback and cleanup registry for compensating failed deployments
// ABOUTME: Maps components to compensating actions and tracks ad-hoc resources for bulk teardown

use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use tracing::{debug, error, info, warn};

use super::action::SharedAction;
use super::error::{EngineError, Result};
use super::report::{ComponentReportEntry, ComponentStatus};
use super::retry::{RetryExecutor, RetryPolicy};

/// A resource acquired during execution, recorded for later bulk teardown
/// outside the task/component model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedResource {
    pub resource_type: String,
    pub id: String,
    pub owning_component: String,
}

/// A logical deployment unit with optional compensating actions.
struct ComponentEntry {
    rollback: Option<SharedAction>,
    cleanup: Option<SharedAction>,
    rolled_back: Option<ComponentStatus>,
    cleaned_up: Option<ComponentStatus>,
}

impl ComponentEntry {
    fn empty() -> Self {
        Self {
            rollback: None,
            cleanup: None,
            rolled_back: None,
            cleaned_up: None,
        }
    }
}

/// Outcome of a tracked-resource sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub attempted: usize,
    pub failed: usize,
}

impl SweepSummary {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

type TeardownFn = Box<dyn Fn(&TrackedResource) -> SharedAction + Send + Sync>;

/// Per-component compensating actions plus tracked-resource bulk teardown.
///
/// Rollback is never triggered automatically; the orchestrating caller
/// decides on overall failure. A registered rollback runs at most once per
/// component; idempotency beyond that is the action's responsibility.
pub struct RollbackRegistry {
    components: IndexMap<String, ComponentEntry>,
    resources: IndexMap<String, Vec<TrackedResource>>,
    teardowns: IndexMap<String, TeardownFn>,
    records: Vec<(String, ComponentReportEntry)>,
    action_timeout: Duration,
}

impl RollbackRegistry {
    pub fn new(action_timeout: Duration) -> Self {
        Self {
            components: IndexMap::new(),
            resources: IndexMap::new(),
            teardowns: IndexMap::new(),
            records: Vec::new(),
            action_timeout,
        }
    }

    pub fn register_rollback(&mut self, component: impl Into<String>, action: SharedAction) {
        let entry = self
            .components
            .entry(component.into())
            .or_insert_with(ComponentEntry::empty);
        entry.rollback = Some(action);
    }

    pub fn register_cleanup(&mut self, component: impl Into<String>, action: SharedAction) {
        let entry = self
            .components
            .entry(component.into())
            .or_insert_with(ComponentEntry::empty);
        entry.cleanup = Some(action);
    }

    /// Register the teardown used for every tracked resource of a type.
    pub fn register_teardown<F>(&mut self, resource_type: impl Into<String>, teardown: F)
    where
        F: Fn(&TrackedResource) -> SharedAction + Send + Sync + 'static,
    {
        self.teardowns
            .insert(resource_type.into(), Box::new(teardown));
    }

    pub fn track_resource(
        &mut self,
        resource_type: impl Into<String>,
        id: impl Into<String>,
        owning_component: impl Into<String>,
    ) {
        let resource_type = resource_type.into();
        let resource = TrackedResource {
            resource_type: resource_type.clone(),
            id: id.into(),
            owning_component: owning_component.into(),
        };
        debug!(
            resource_type = %resource.resource_type,
            id = %resource.id,
            component = %resource.owning_component,
            "tracking resource"
        );
        self.resources.entry(resource_type).or_default().push(resource);
    }

    pub fn tracked_resources(&self) -> impl Iterator<Item = &TrackedResource> {
        self.resources.values().flatten()
    }

    /// Compensating-action outcomes recorded so far, in invocation order.
    pub fn records(&self) -> &[(String, ComponentReportEntry)] {
        &self.records
    }

    /// Run the registered rollback action for one component: single attempt
    /// by default, bounded by the registry's action timeout. A component
    /// already rolled back is not re-invoked; the recorded status is
    /// returned instead.
    pub async fn rollback(
        &mut self,
        component: &str,
        executor: &RetryExecutor,
    ) -> Result<ComponentStatus> {
        let entry = self.components.get(component).ok_or_else(|| {
            EngineError::RollbackNotRegistered {
                component: component.to_string(),
            }
        })?;

        if let Some(status) = entry.rolled_back {
            debug!(component, "rollback already ran, not re-invoking");
            return Ok(status);
        }

        let action = entry
            .rollback
            .as_ref()
            .ok_or_else(|| EngineError::RollbackNotRegistered {
                component: component.to_string(),
            })?
            .clone();

        info!(component, "rolling back component");
        let start_time = Utc::now();
        let started = std::time::Instant::now();

        let report = executor
            .execute_with_retry(
                action.as_ref(),
                &RetryPolicy::no_retry(),
                Some(self.action_timeout),
                &format!("rollback:{}", component),
            )
            .await;

        let status = if report.is_success() {
            info!(component, "rollback succeeded");
            ComponentStatus::RolledBack
        } else {
            error!(
                component,
                error = report.outcome.error_message(),
                "rollback failed"
            );
            ComponentStatus::RollbackFailed
        };

        self.record(component, status, start_time, started.elapsed(), &report);
        if let Some(entry) = self.components.get_mut(component) {
            entry.rolled_back = Some(status);
        }

        Ok(status)
    }

    /// Roll back several components strictly sequentially, in the caller's
    /// order. Ordering is semantically significant: dependents must be torn
    /// down before the resources they depend on. A failing rollback is
    /// recorded and the remaining components still run.
    pub async fn rollback_many(
        &mut self,
        components: &[&str],
        executor: &RetryExecutor,
    ) -> Vec<(String, Result<ComponentStatus>)> {
        let mut outcomes = Vec::with_capacity(components.len());
        for component in components {
            let outcome = self.rollback(component, executor).await;
            outcomes.push((component.to_string(), outcome));
        }
        outcomes
    }

    /// Run the registered cleanup action for one component, same contract as
    /// rollback.
    pub async fn cleanup(
        &mut self,
        component: &str,
        executor: &RetryExecutor,
    ) -> Result<ComponentStatus> {
        let entry = self.components.get(component).ok_or_else(|| {
            EngineError::CleanupNotRegistered {
                component: component.to_string(),
            }
        })?;

        if let Some(status) = entry.cleaned_up {
            debug!(component, "cleanup already ran, not re-invoking");
            return Ok(status);
        }

        let action = entry
            .cleanup
            .as_ref()
            .ok_or_else(|| EngineError::CleanupNotRegistered {
                component: component.to_string(),
            })?
            .clone();

        info!(component, "cleaning up component");
        let start_time = Utc::now();
        let started = std::time::Instant::now();

        let report = executor
            .execute_with_retry(
                action.as_ref(),
                &RetryPolicy::no_retry(),
                Some(self.action_timeout),
                &format!("cleanup:{}", component),
            )
            .await;

        let status = if report.is_success() {
            ComponentStatus::CleanedUp
        } else {
            error!(
                component,
                error = report.outcome.error_message(),
                "cleanup failed"
            );
            ComponentStatus::CleanupFailed
        };

        self.record(component, status, start_time, started.elapsed(), &report);
        if let Some(entry) = self.components.get_mut(component) {
            entry.cleaned_up = Some(status);
        }

        Ok(status)
    }

    /// Tear down every tracked resource, by type, through the matching
    /// registered teardown. Best-effort: failures are counted but the sweep
    /// always finishes the full pass. Swept resources are removed.
    pub async fn cleanup_tracked_resources(&mut self, executor: &RetryExecutor) -> SweepSummary {
        let mut attempted = 0;
        let mut failed = 0;

        let resources: Vec<TrackedResource> = self.resources.values().flatten().cloned().collect();

        for resource in &resources {
            attempted += 1;

            let Some(teardown) = self.teardowns.get(&resource.resource_type) else {
                warn!(
                    resource_type = %resource.resource_type,
                    id = %resource.id,
                    "no teardown registered for resource type"
                );
                failed += 1;
                continue;
            };

            let action = teardown(resource);
            let report = executor
                .execute_with_retry(
                    action.as_ref(),
                    &RetryPolicy::no_retry(),
                    Some(self.action_timeout),
                    &format!("teardown:{}/{}", resource.resource_type, resource.id),
                )
                .await;

            if report.is_success() {
                debug!(
                    resource_type = %resource.resource_type,
                    id = %resource.id,
                    "resource torn down"
                );
            } else {
                error!(
                    resource_type = %resource.resource_type,
                    id = %resource.id,
                    error = report.outcome.error_message(),
                    "resource teardown failed"
                );
                failed += 1;
            }
        }

        self.resources.clear();

        let summary = SweepSummary { attempted, failed };
        info!(
            attempted = summary.attempted,
            failed = summary.failed,
            "tracked-resource sweep finished"
        );
        summary
    }

    fn record(
        &mut self,
        component: &str,
        status: ComponentStatus,
        start_time: chrono::DateTime<Utc>,
        duration: Duration,
        report: &super::retry::AttemptReport,
    ) {
        self.records.push((
            component.to_string(),
            ComponentReportEntry {
                status,
                start_time,
                duration_seconds: duration.as_secs_f64(),
                error: report.outcome.error_message().map(String::from),
            },
        ));
    }
}

impl Default for RollbackRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

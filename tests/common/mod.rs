// ABOUTME: Shared helpers for integration tests
// ABOUTME: Builds instrumented actions that record invocations, ordering, and concurrency

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use labforge::engine::{ActionOutcome, FnAction, SharedAction};

/// Shared observation state for one orchestrated run.
#[derive(Default)]
pub struct Probe {
    pub invocations: Mutex<Vec<String>>,
    pub completed: Mutex<HashSet<String>>,
    pub active: AtomicU32,
    pub peak_active: AtomicU32,
    pub violations: Mutex<Vec<String>>,
}

impl Probe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn invocation_count(&self, id: &str) -> usize {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|x| x.as_str() == id)
            .count()
    }

    pub fn peak(&self) -> u32 {
        self.peak_active.load(Ordering::SeqCst)
    }

    pub fn violations(&self) -> Vec<String> {
        self.violations.lock().unwrap().clone()
    }
}

/// An action that records itself against the probe, verifies its declared
/// dependencies already completed, holds a concurrency slot for `hold`, and
/// resolves to `outcome`.
pub fn probed_action(
    probe: &Arc<Probe>,
    id: &str,
    dependencies: &[&str],
    hold: Duration,
    outcome: ActionOutcome,
) -> SharedAction {
    let probe = Arc::clone(probe);
    let id = id.to_string();
    let dependencies: Vec<String> = dependencies.iter().map(|d| d.to_string()).collect();

    FnAction::shared(move || {
        let probe = Arc::clone(&probe);
        let id = id.clone();
        let dependencies = dependencies.clone();
        let outcome = outcome.clone();
        async move {
            probe.invocations.lock().unwrap().push(id.clone());

            {
                let completed = probe.completed.lock().unwrap();
                for dep in &dependencies {
                    if !completed.contains(dep) {
                        probe.violations.lock().unwrap().push(format!(
                            "task '{}' started before dependency '{}' completed",
                            id, dep
                        ));
                    }
                }
            }

            let now = probe.active.fetch_add(1, Ordering::SeqCst) + 1;
            probe.peak_active.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(hold).await;

            probe.active.fetch_sub(1, Ordering::SeqCst);

            if outcome.is_success() {
                probe.completed.lock().unwrap().insert(id);
            }
            outcome
        }
    })
}

pub fn succeeding(probe: &Arc<Probe>, id: &str, dependencies: &[&str]) -> SharedAction {
    probed_action(
        probe,
        id,
        dependencies,
        Duration::from_millis(10),
        ActionOutcome::Success,
    )
}

pub fn failing(probe: &Arc<Probe>, id: &str) -> SharedAction {
    probed_action(
        probe,
        id,
        &[],
        Duration::from_millis(10),
        ActionOutcome::failure("induced failure"),
    )
}

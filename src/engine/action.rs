// ABOUTME: Action trait and built-in action implementations
// ABOUTME: Defines the opaque unit of work the engine schedules, retries, and rolls back

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Outcome of a single action invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Success,
    Failure(String),
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Success)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ActionOutcome::Failure(message.into())
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ActionOutcome::Success => None,
            ActionOutcome::Failure(msg) => Some(msg),
        }
    }
}

/// An opaque unit of work. The engine only needs a run that resolves to
/// success or failure, and an optional cancel for timed-out invocations.
///
/// Actions without cancel support are detached on timeout; the attempt
/// future is dropped and the underlying work may keep running. The engine
/// logs a warning when that happens instead of silently leaking.
#[async_trait]
pub trait Action: Send + Sync {
    async fn run(&self) -> ActionOutcome;

    /// Whether this action can terminate its in-flight work.
    fn supports_cancel(&self) -> bool {
        false
    }

    /// Terminate in-flight work after a timeout. Only called when
    /// `supports_cancel()` returns true.
    async fn cancel(&self) {}
}

pub type SharedAction = Arc<dyn Action>;

type BoxedActionFn =
    Box<dyn Fn() -> Pin<Box<dyn Future<Output = ActionOutcome> + Send>> + Send + Sync>;

/// Adapter turning an async closure into an Action.
pub struct FnAction {
    func: BoxedActionFn,
}

impl FnAction {
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionOutcome> + Send + 'static,
    {
        Self {
            func: Box::new(move || Box::pin(func())),
        }
    }

    /// Wrap an async closure, shared-pointer form for registration APIs.
    pub fn shared<F, Fut>(func: F) -> SharedAction
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionOutcome> + Send + 'static,
    {
        Arc::new(Self::new(func))
    }
}

#[async_trait]
impl Action for FnAction {
    async fn run(&self) -> ActionOutcome {
        (self.func)().await
    }
}

/// Runs an external program with typed program/argument fields. Command
/// strings are never re-parsed or shell-evaluated.
pub struct CommandAction {
    program: String,
    args: Vec<String>,
    child: Mutex<Option<tokio::process::Child>>,
}

impl CommandAction {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            child: Mutex::new(None),
        }
    }

    pub fn shared(program: impl Into<String>, args: Vec<String>) -> SharedAction {
        Arc::new(Self::new(program, args))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl Action for CommandAction {
    async fn run(&self) -> ActionOutcome {
        debug!(program = %self.program, "spawning command action");

        let spawned = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        match spawned {
            Ok(child) => {
                *self.child.lock().await = Some(child);
            }
            Err(e) => {
                return ActionOutcome::failure(format!(
                    "failed to spawn '{}': {}",
                    self.program, e
                ));
            }
        }

        // The child lives in the mutex so cancel() can reach it; the lock is
        // only held for a single try_wait between polls.
        loop {
            {
                let mut guard = self.child.lock().await;
                let child = match guard.as_mut() {
                    Some(child) => child,
                    // cancel() reaped the child out from under us
                    None => return ActionOutcome::failure("command cancelled".to_string()),
                };

                match child.try_wait() {
                    Ok(Some(status)) => {
                        *guard = None;
                        if status.success() {
                            return ActionOutcome::Success;
                        }
                        return ActionOutcome::failure(format!(
                            "'{}' exited with {}",
                            self.program, status
                        ));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        *guard = None;
                        return ActionOutcome::failure(format!(
                            "failed to wait on '{}': {}",
                            self.program, e
                        ));
                    }
                }
            }

            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
    }

    fn supports_cancel(&self) -> bool {
        true
    }

    async fn cancel(&self) {
        let mut guard = self.child.lock().await;
        if let Some(mut child) = guard.take() {
            warn!(program = %self.program, "killing timed-out command");
            if let Err(e) = child.kill().await {
                warn!(program = %self.program, "failed to kill command: {}", e);
            }
        }
    }
}
